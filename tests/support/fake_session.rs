// ABOUTME: In-memory connector and session for exercising the bridge without a server.
// ABOUTME: Records connects, operations and closes so tests can check the session lifecycle.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sshbridge::bridge::{Connector, OperationError, RemoteSession};
use sshbridge::ssh::{CommandOutput, DirEntry, SessionConfig};
use sshbridge::types::{RemotePath, ShellCommand};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, inspectable state behind a fake remote host.
#[derive(Default)]
pub struct FakeHost {
    pub files: HashMap<String, Vec<u8>>,
    pub dirs: HashMap<String, Vec<DirEntry>>,
    pub exec_output: CommandOutput,
    pub connect_error: Option<String>,
    pub fail_close: bool,
    pub connects: usize,
    pub closes: usize,
    pub commands: Vec<String>,
    pub operations: Vec<&'static str>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub host: Arc<Mutex<FakeHost>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.host.lock().files.insert(path.to_string(), contents.to_vec());
        self
    }

    pub fn with_dir(self, path: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|name| DirEntry {
                filename: name.to_string(),
                longname: format!("-rw-r--r--    1 user     user          0 Jan  1 00:00 {}", name),
            })
            .collect();
        self.host.lock().dirs.insert(path.to_string(), entries);
        self
    }

    pub fn with_exec_output(self, exit_code: u32, stdout: &str, stderr: &str) -> Self {
        self.host.lock().exec_output = CommandOutput {
            exit_code: Some(exit_code),
            exit_signal: None,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
        self
    }

    pub fn refusing(self, message: &str) -> Self {
        self.host.lock().connect_error = Some(message.to_string());
        self
    }

    pub fn failing_close(self) -> Self {
        self.host.lock().fail_close = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.host.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.host.lock().closes
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.host.lock().operations.clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.host.lock().files.get(path).cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, _config: &SessionConfig) -> Result<FakeSession, OperationError> {
        let mut host = self.host.lock();
        if let Some(message) = &host.connect_error {
            return Err(OperationError::Connection(message.clone()));
        }
        host.connects += 1;
        Ok(FakeSession {
            host: Arc::clone(&self.host),
        })
    }
}

pub struct FakeSession {
    host: Arc<Mutex<FakeHost>>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn upload(
        &self,
        remote_path: &RemotePath,
        contents: &[u8],
    ) -> Result<(), OperationError> {
        let mut host = self.host.lock();
        host.operations.push("upload");
        if host.dirs.contains_key(remote_path.as_str()) {
            return Err(OperationError::Transfer(format!(
                "{} is a directory",
                remote_path
            )));
        }
        host.files
            .insert(remote_path.as_str().to_string(), contents.to_vec());
        Ok(())
    }

    async fn download(&self, remote_path: &RemotePath) -> Result<Bytes, OperationError> {
        let mut host = self.host.lock();
        host.operations.push("download");
        host.files
            .get(remote_path.as_str())
            .map(|contents| Bytes::from(contents.clone()))
            .ok_or_else(|| OperationError::Transfer("No such file".to_string()))
    }

    async fn list(&self, remote_path: &RemotePath) -> Result<Vec<DirEntry>, OperationError> {
        let mut host = self.host.lock();
        host.operations.push("list");
        host.dirs
            .get(remote_path.as_str())
            .cloned()
            .ok_or_else(|| OperationError::Transfer("No such file".to_string()))
    }

    async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput, OperationError> {
        let mut host = self.host.lock();
        host.operations.push("exec");
        host.commands.push(command.as_str().to_string());
        Ok(host.exec_output.clone())
    }

    async fn close(self) -> Result<(), OperationError> {
        let mut host = self.host.lock();
        host.closes += 1;
        if host.fail_close {
            return Err(OperationError::Connection("connection reset".to_string()));
        }
        Ok(())
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig::new("fake.example", "tester").password("secret")
}

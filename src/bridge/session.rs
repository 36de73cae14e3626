// ABOUTME: Traits at the seam between the executor and the SSH layer.
// ABOUTME: Implements them for russh sessions and classifies SSH errors into OperationError.

use super::error::OperationError;
use crate::ssh::{self, CommandOutput, DirEntry, SessionConfig};
use crate::types::{RemotePath, ShellCommand};
use async_trait::async_trait;
use bytes::Bytes;

/// A live, authenticated session that can run one operation.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Create or truncate `remote_path` and write `contents` to it.
    async fn upload(&self, remote_path: &RemotePath, contents: &[u8])
    -> Result<(), OperationError>;

    /// Read the whole remote file.
    async fn download(&self, remote_path: &RemotePath) -> Result<Bytes, OperationError>;

    /// List a remote directory in server order.
    async fn list(&self, remote_path: &RemotePath) -> Result<Vec<DirEntry>, OperationError>;

    /// Run a command and collect both output streams.
    async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput, OperationError>;

    /// Tear the session down.
    async fn close(self) -> Result<(), OperationError>
    where
        Self: Sized;
}

/// Opens one session per call.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    async fn connect(&self, config: &SessionConfig) -> Result<Self::Session, OperationError>;
}

/// Connector backed by russh.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Session = ssh::Session;

    async fn connect(&self, config: &SessionConfig) -> Result<Self::Session, OperationError> {
        ssh::Session::connect(config.clone())
            .await
            .map_err(|e| OperationError::Connection(e.to_string()))
    }
}

fn transfer_error(e: ssh::Error) -> OperationError {
    OperationError::Transfer(e.to_string())
}

#[async_trait]
impl RemoteSession for ssh::Session {
    async fn upload(
        &self,
        remote_path: &RemotePath,
        contents: &[u8],
    ) -> Result<(), OperationError> {
        ssh::Session::upload(self, remote_path.as_str(), contents)
            .await
            .map_err(transfer_error)
    }

    async fn download(&self, remote_path: &RemotePath) -> Result<Bytes, OperationError> {
        ssh::Session::download(self, remote_path.as_str())
            .await
            .map(Bytes::from)
            .map_err(transfer_error)
    }

    async fn list(&self, remote_path: &RemotePath) -> Result<Vec<DirEntry>, OperationError> {
        self.read_dir(remote_path.as_str())
            .await
            .map_err(transfer_error)
    }

    async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput, OperationError> {
        // Failing to run the command at all is a session failure, not a
        // remote exec failure: there is no exit status or stderr to report.
        ssh::Session::exec(self, command.as_str())
            .await
            .map_err(|e| OperationError::Connection(e.to_string()))
    }

    async fn close(self) -> Result<(), OperationError> {
        self.disconnect()
            .await
            .map_err(|e| OperationError::Connection(e.to_string()))
    }
}

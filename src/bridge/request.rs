// ABOUTME: Typed operation requests and their success payloads.
// ABOUTME: Requests are built from validated parameters, so every variant is executable.

use crate::ssh::DirEntry;
use crate::types::{LocalPath, RemotePath, ShellCommand};
use bytes::Bytes;

use super::error::OperationError;

/// Exactly one remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Upload {
        local_path: LocalPath,
        remote_path: RemotePath,
    },
    Download {
        remote_path: RemotePath,
        local_path: LocalPath,
    },
    List {
        remote_path: RemotePath,
    },
    Exec {
        command: ShellCommand,
    },
}

impl OperationRequest {
    pub fn upload(local_path: &str, remote_path: &str) -> Result<Self, OperationError> {
        Ok(OperationRequest::Upload {
            local_path: LocalPath::new(local_path)?,
            remote_path: RemotePath::new(remote_path)?,
        })
    }

    pub fn download(remote_path: &str, local_path: &str) -> Result<Self, OperationError> {
        Ok(OperationRequest::Download {
            remote_path: RemotePath::new(remote_path)?,
            local_path: LocalPath::new(local_path)?,
        })
    }

    pub fn list(remote_path: &str) -> Result<Self, OperationError> {
        Ok(OperationRequest::List {
            remote_path: RemotePath::new(remote_path)?,
        })
    }

    pub fn exec(command: &str) -> Result<Self, OperationError> {
        Ok(OperationRequest::Exec {
            command: ShellCommand::new(command)?,
        })
    }

    /// Operation name, as used on the wire and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            OperationRequest::Upload { .. } => "upload",
            OperationRequest::Download { .. } => "download",
            OperationRequest::List { .. } => "list",
            OperationRequest::Exec { .. } => "exec",
        }
    }
}

/// Successful result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Upload confirmation or command output.
    Text(String),
    /// Downloaded file contents.
    Bytes(Bytes),
    /// Directory listing in server order.
    Entries(Vec<DirEntry>),
}

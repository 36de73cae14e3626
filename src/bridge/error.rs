// ABOUTME: Classified failures returned by bridge operations.
// ABOUTME: Callers branch on ErrorKind instead of parsing message text.

use crate::types::{LocalPathError, RemotePathError, ShellCommandError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure classification shared by startup and per-call errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ConfigurationError")]
    Configuration,
    #[serde(rename = "ConnectionError")]
    Connection,
    #[serde(rename = "LocalIoError")]
    LocalIo,
    #[serde(rename = "TransferError")]
    Transfer,
    #[serde(rename = "RemoteExecError")]
    RemoteExec,
    InvalidArgument,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::LocalIo => "LocalIoError",
            ErrorKind::Transfer => "TransferError",
            ErrorKind::RemoteExec => "RemoteExecError",
            ErrorKind::InvalidArgument => "InvalidArgument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one bridge invocation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("local I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer error: {0}")]
    Transfer(String),

    /// The remote command wrote to standard error.
    #[error("remote command failed ({}): {stderr}", describe_exit(.exit_code, .signal))]
    RemoteExec {
        exit_code: Option<u32>,
        signal: Option<String>,
        stderr: String,
    },
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            OperationError::Connection(_) => ErrorKind::Connection,
            OperationError::LocalIo { .. } => ErrorKind::LocalIo,
            OperationError::Transfer(_) => ErrorKind::Transfer,
            OperationError::RemoteExec { .. } => ErrorKind::RemoteExec,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        OperationError::InvalidArgument(message.into())
    }
}

fn describe_exit(exit_code: &Option<u32>, signal: &Option<String>) -> String {
    match (exit_code, signal) {
        (Some(code), Some(signal)) => format!("exit code {}, signal {}", code, signal),
        (Some(code), None) => format!("exit code {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => "no exit status".to_string(),
    }
}

impl From<RemotePathError> for OperationError {
    fn from(e: RemotePathError) -> Self {
        OperationError::InvalidArgument(e.to_string())
    }
}

impl From<LocalPathError> for OperationError {
    fn from(e: LocalPathError) -> Self {
        OperationError::InvalidArgument(e.to_string())
    }
}

impl From<ShellCommandError> for OperationError {
    fn from(e: ShellCommandError) -> Self {
        OperationError::InvalidArgument(e.to_string())
    }
}

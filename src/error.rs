// ABOUTME: Application-wide error types for sshbridge.
// ABOUTME: Startup configuration failures and request-loop I/O, via thiserror.

use crate::bridge::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid port: {0:?} (expected 1-65535)")]
    InvalidPort(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("cannot read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Everything except request-loop I/O is a configuration problem.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Io(_) => None,
            _ => Some(ErrorKind::Configuration),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

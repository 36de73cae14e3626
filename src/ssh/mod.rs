// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Supports password and key authentication, remote exec, and SFTP transfers.

mod client;
mod error;

pub use client::{Auth, CommandOutput, DirEntry, KeyMaterial, Session, SessionConfig};
pub use error::{Error, Result};

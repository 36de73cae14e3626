// ABOUTME: Validated domain types for operation parameters.
// ABOUTME: Invalid paths and commands cannot be constructed, so they never reach a session.

mod local_path;
mod remote_path;
mod shell_command;

pub use local_path::{LocalPath, LocalPathError};
pub use remote_path::{RemotePath, RemotePathError};
pub use shell_command::{ShellCommand, ShellCommandError};

// ABOUTME: Validated shell command for remote execution.
// ABOUTME: Rejects blank commands; the accepted text is sent to the remote shell untouched.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShellCommandError {
    #[error("command cannot be empty")]
    Empty,

    #[error("command cannot be blank")]
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShellCommand(String);

impl ShellCommand {
    /// Validate a command. Surrounding whitespace is kept as given; only the
    /// check is done on the trimmed text.
    pub fn new(value: &str) -> Result<Self, ShellCommandError> {
        if value.is_empty() {
            return Err(ShellCommandError::Empty);
        }
        if value.trim().is_empty() {
            return Err(ShellCommandError::Blank);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

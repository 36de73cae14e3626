// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Connection settings are global flags with environment fallbacks.

use clap::{Args, Parser, Subcommand};
use sshbridge::config::Overrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sshbridge")]
#[command(about = "Upload, download, list and exec on a remote host over JSON-RPC on stdio")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Path to the config file (default: ./sshbridge.yml if present)
    #[arg(short, long, global = true, env = "SSHBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Remote host
    #[arg(long, global = true, env = "SSH_HOST")]
    pub host: Option<String>,

    /// SSH port (default: 22)
    #[arg(long, global = true, env = "SSH_PORT")]
    pub port: Option<String>,

    /// Login user
    #[arg(long, global = true, env = "SSH_USER")]
    pub user: Option<String>,

    /// Password; takes precedence over --key-file
    #[arg(long, global = true, env = "SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Private key file
    #[arg(long, global = true, env = "SSH_KEY_FILE")]
    pub key_file: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn into_overrides(self) -> Overrides {
        Overrides {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password,
            key_file: self.key_file,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve JSON-RPC requests on stdin/stdout (default)
    Serve,

    /// Write a sshbridge.yml template to the current directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

// ABOUTME: Entry point for the sshbridge CLI application.
// ABOUTME: Resolves configuration once, then serves requests on stdin/stdout.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sshbridge::bridge::Bridge;
use sshbridge::config::{self, Config};
use sshbridge::error::Result;
use sshbridge::server;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // stdout carries responses, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        match e.kind() {
            Some(kind) => eprintln!("Error: {kind}: {e}"),
            None => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init { force } => {
            let host = cli.connection.host.clone();
            let user = cli.connection.user.clone();
            config::init_config(&cwd, host.as_deref(), user.as_deref(), force)?;
            eprintln!("Created {}", config::CONFIG_FILENAME);
            Ok(())
        }
        Commands::Serve => {
            let file_config = match &cli.config {
                Some(path) => Config::load(path)?,
                None => Config::discover(&cwd)?,
            };
            let session_config = file_config
                .with_overrides(cli.connection.into_overrides())?
                .session_config()?;

            tracing::info!(
                host = %session_config.host,
                port = session_config.port,
                user = %session_config.user,
                auth = session_config.auth.method(),
                "serving requests on stdin"
            );

            let bridge = Arc::new(Bridge::ssh(session_config));
            server::serve(bridge, tokio::io::stdin(), tokio::io::stdout()).await?;
            Ok(())
        }
    }
}

// ABOUTME: Library root for sshbridge - exposes the bridge core for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod bridge;
pub mod config;
pub mod error;
pub mod server;
pub mod ssh;
pub mod types;

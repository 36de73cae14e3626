// ABOUTME: Bridge core: one SSH session per invocation, one operation per session.
// ABOUTME: Connects with the configured credentials, executes, and always closes.

mod error;
mod executor;
mod request;
mod session;

pub use error::{ErrorKind, OperationError};
pub use executor::{exec_outcome, execute};
pub use request::{OperationRequest, Payload};
pub use session::{Connector, RemoteSession, SshConnector};

use crate::ssh::SessionConfig;

/// Invokes operations against one configured host.
///
/// Holds no per-call state, so a shared reference can serve any number of
/// concurrent invocations, each with its own session.
#[derive(Debug)]
pub struct Bridge<C = SshConnector> {
    connector: C,
    config: SessionConfig,
}

impl Bridge<SshConnector> {
    pub fn ssh(config: SessionConfig) -> Self {
        Self::new(SshConnector, config)
    }
}

impl<C: Connector> Bridge<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect, run `request`, and close the session.
    pub async fn invoke(&self, request: &OperationRequest) -> Result<Payload, OperationError> {
        let operation = request.name();
        tracing::debug!(
            operation,
            host = %self.config.host,
            port = self.config.port,
            "connecting"
        );

        let session = self.connector.connect(&self.config).await.inspect_err(|e| {
            tracing::warn!(operation, host = %self.config.host, "connect failed: {}", e);
        })?;

        let result = execute(session, request).await;
        match &result {
            Ok(_) => tracing::info!(operation, "operation succeeded"),
            Err(e) => tracing::info!(operation, kind = %e.kind(), "operation failed: {}", e),
        }
        result
    }
}

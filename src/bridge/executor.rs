// ABOUTME: Runs exactly one operation on a live session, then closes it.
// ABOUTME: Applies the exec policy that any stderr output fails the command.

use super::error::OperationError;
use super::request::{OperationRequest, Payload};
use super::session::RemoteSession;
use crate::ssh::CommandOutput;

/// Execute `request` on `session`.
///
/// The session is consumed and closed before this returns, whatever the
/// outcome. A failed close is logged and does not change the result.
pub async fn execute<S: RemoteSession>(
    session: S,
    request: &OperationRequest,
) -> Result<Payload, OperationError> {
    let operation = request.name();
    let result = perform(&session, request).await;

    if let Err(e) = session.close().await {
        tracing::warn!(operation, "failed to close session: {}", e);
    }

    result
}

async fn perform<S: RemoteSession>(
    session: &S,
    request: &OperationRequest,
) -> Result<Payload, OperationError> {
    match request {
        OperationRequest::Upload {
            local_path,
            remote_path,
        } => {
            let contents = tokio::fs::read(local_path.as_path()).await.map_err(|source| {
                OperationError::LocalIo {
                    path: local_path.as_path().to_path_buf(),
                    source,
                }
            })?;
            tracing::debug!(%local_path, %remote_path, bytes = contents.len(), "uploading");
            session.upload(remote_path, &contents).await?;
            Ok(Payload::Text(format!(
                "File uploaded successfully to {}",
                remote_path
            )))
        }
        OperationRequest::Download { remote_path, .. } => {
            let contents = session.download(remote_path).await?;
            tracing::debug!(%remote_path, bytes = contents.len(), "downloaded");
            Ok(Payload::Bytes(contents))
        }
        OperationRequest::List { remote_path } => {
            let entries = session.list(remote_path).await?;
            tracing::debug!(%remote_path, entries = entries.len(), "listed");
            Ok(Payload::Entries(entries))
        }
        OperationRequest::Exec { command } => {
            let output = session.exec(command).await?;
            tracing::debug!(
                exit_code = ?output.exit_code,
                signal = ?output.exit_signal,
                stdout_len = output.stdout.len(),
                stderr_len = output.stderr.len(),
                "command finished"
            );
            exec_outcome(output)
        }
    }
}

/// Turn command output into a result.
///
/// Any standard-error output fails the operation, even with exit code 0 and
/// even when standard output has content. With empty stderr the command
/// succeeds whatever its exit code.
pub fn exec_outcome(output: CommandOutput) -> Result<Payload, OperationError> {
    if !output.stderr.is_empty() {
        return Err(OperationError::RemoteExec {
            exit_code: output.exit_code,
            signal: output.exit_signal,
            stderr: output.stderr,
        });
    }
    Ok(Payload::Text(output.stdout))
}

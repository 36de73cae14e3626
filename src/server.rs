// ABOUTME: Line-delimited JSON-RPC 2.0 request loop over stdin/stdout.
// ABOUTME: Maps untyped params to validated requests and renders results or classified errors.

use crate::bridge::{Bridge, Connector, OperationError, OperationRequest, Payload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const OPERATION_FAILED: i64 = -32000;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    fn failure(id: Value, err: &OperationError) -> Self {
        let code = match err {
            OperationError::InvalidArgument(_) => INVALID_PARAMS,
            _ => OPERATION_FAILED,
        };
        let mut data = json!({ "kind": err.kind() });
        if let OperationError::RemoteExec {
            exit_code,
            signal,
            stderr,
        } = err
        {
            data["exitCode"] = json!(exit_code);
            data["signal"] = json!(signal);
            data["stderr"] = json!(stderr);
        }
        Self::error(id, code, err.to_string(), Some(data))
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| encode_failure_line(&e))
    }
}

fn encode_failure_line(err: &dyn std::fmt::Display) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": Value::Null,
        "error": {
            "code": OPERATION_FAILED,
            "message": format!("failed to encode response: {}", err),
        },
    })
    .to_string()
}

/// A line from the client, either ready to run or already answered.
enum Incoming {
    Call { id: Value, request: OperationRequest },
    Rejected(RpcResponse),
}

fn parse_line(line: &str) -> Incoming {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            return Incoming::Rejected(RpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {}", e),
                None,
            ));
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let rpc: RpcRequest = match serde_json::from_value(value) {
        Ok(rpc) => rpc,
        Err(e) => {
            return Incoming::Rejected(RpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("invalid request: {}", e),
                None,
            ));
        }
    };

    let empty = Map::new();
    let params = match &rpc.params {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(params)) => params,
        Some(_) => {
            return Incoming::Rejected(RpcResponse::error(
                rpc.id,
                INVALID_REQUEST,
                "params must be an object",
                None,
            ));
        }
    };

    match build_request(&rpc.method, params) {
        Ok(Some(request)) => Incoming::Call {
            id: rpc.id,
            request,
        },
        Ok(None) => Incoming::Rejected(RpcResponse::error(
            rpc.id,
            METHOD_NOT_FOUND,
            format!("unknown method: {}", rpc.method),
            None,
        )),
        Err(e) => Incoming::Rejected(RpcResponse::failure(rpc.id, &e)),
    }
}

/// Map a method and its params to a typed request. `Ok(None)` for an
/// unknown method.
pub fn build_request(
    method: &str,
    params: &Map<String, Value>,
) -> Result<Option<OperationRequest>, OperationError> {
    let request = match method {
        "upload" => OperationRequest::upload(
            string_param(params, "localPath")?,
            string_param(params, "remotePath")?,
        )?,
        "download" => OperationRequest::download(
            string_param(params, "remotePath")?,
            string_param(params, "localPath")?,
        )?,
        "list" => OperationRequest::list(string_param(params, "remotePath")?)?,
        "exec" => OperationRequest::exec(string_param(params, "command")?)?,
        _ => return Ok(None),
    };
    Ok(Some(request))
}

fn string_param<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, OperationError> {
    match params.get(name) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(OperationError::invalid_argument(format!(
            "parameter {} must be a string",
            name
        ))),
        None => Err(OperationError::invalid_argument(format!(
            "missing required parameter: {}",
            name
        ))),
    }
}

/// Run one request and render its result.
///
/// Downloads are written to the requested local path here; the bridge only
/// returns bytes.
pub async fn dispatch<C: Connector>(
    bridge: &Bridge<C>,
    request: OperationRequest,
) -> Result<Value, OperationError> {
    let payload = bridge.invoke(&request).await?;

    let result = match (payload, &request) {
        (Payload::Bytes(contents), OperationRequest::Download { local_path, .. }) => {
            write_replacing(local_path.as_path(), &contents)
                .await
                .map_err(|source| OperationError::LocalIo {
                    path: local_path.as_path().to_path_buf(),
                    source,
                })?;
            json!({
                "text": format!("File downloaded successfully to {}", local_path),
                "bytes": contents.len(),
            })
        }
        (Payload::Bytes(contents), _) => json!({ "bytes": contents.len() }),
        (Payload::Text(text), _) => json!({ "text": text }),
        (Payload::Entries(entries), _) => json!({ "entries": entries }),
    };
    Ok(result)
}

/// Write `contents` to a sibling temp file and rename it over `path`, so a
/// failed write never leaves a truncated file behind.
async fn write_replacing(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = temp_sibling_path(path);
    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    written
}

fn temp_sibling_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{}.{}-{}.part",
        name,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Serve requests from `input` until EOF, writing one response line per
/// request to `output`.
///
/// Each request runs on its own task with its own session. Responses are
/// written by a single task so lines never interleave; their order follows
/// completion, not arrival. Requests still in flight at EOF are awaited.
///
/// Once `output` fails no new requests are started; the write error is
/// returned after in-flight requests finish.
pub async fn serve<C, R, W>(bridge: Arc<Bridge<C>>, input: R, output: W) -> io::Result<()>
where
    C: Connector + 'static,
    C::Session: 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<RpcResponse>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = rx.recv().await {
            let mut line = response.to_line();
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut input = BufReader::new(input);
    let mut buf = Vec::new();
    let mut in_flight = JoinSet::new();
    let mut read_result = Ok(());

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("failed to read request: {}", e);
                read_result = Err(e);
                break;
            }
        }

        let incoming = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_line(line),
            Err(e) => Incoming::Rejected(RpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: request is not valid UTF-8: {}", e),
                None,
            )),
        };

        match incoming {
            Incoming::Rejected(response) => {
                tracing::debug!(id = %response.id, "rejected request");
                if tx.send(response).is_err() {
                    break;
                }
            }
            Incoming::Call { id, request } => {
                if tx.is_closed() {
                    break;
                }
                let bridge = Arc::clone(&bridge);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let response = match dispatch(&bridge, request).await {
                        Ok(result) => RpcResponse::result(id, result),
                        Err(e) => RpcResponse::failure(id, &e),
                    };
                    if tx.send(response).is_err() {
                        tracing::warn!("response dropped, output is closed");
                    }
                });
            }
        }
    }

    if tx.is_closed() {
        tracing::error!("output closed, no longer accepting requests");
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("request task failed: {}", e);
        }
    }

    drop(tx);
    writer.await.map_err(io::Error::other)??;
    read_result
}

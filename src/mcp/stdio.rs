//! Line-delimited JSON-RPC over any reader/writer pair.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::engine::McpEngine;
use super::protocol::{JsonRpcError, McpRequest, McpResponse, RequestId};

/// Serve requests until `reader` reaches EOF.
///
/// Requests are handled one at a time, in arrival order.
pub async fn serve<R, W>(engine: &McpEngine, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match decode(line) {
            Ok(request) => engine.handle(request).await,
            Err(response) => Some(*response),
        };

        if let Some(response) = response {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }
    info!("stdin closed, stopping");
    Ok(())
}

/// Serve on the process's own stdin/stdout.
pub async fn serve_stdio(engine: &McpEngine) -> std::io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(engine, stdin, tokio::io::stdout()).await
}

fn decode(line: &str) -> Result<McpRequest, Box<McpResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "Unparsable line");
        Box::new(McpResponse::error(None, JsonRpcError::parse_error(e)))
    })?;

    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

    serde_json::from_value(value).map_err(|e| {
        debug!(error = %e, "Not a JSON-RPC request");
        Box::new(McpResponse::error(id, JsonRpcError::invalid_request(e)))
    })
}

//! Line-delimited JSON-RPC-over-stdio transport loop. stdout carries
//! only RPC responses; all logging goes to stderr via `tracing` so the
//! two streams never interleave.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::types::{RpcRequest, RpcResponse, PARSE_ERROR};
use crate::server::ToolServer;

pub async fn serve_stdio(server: Arc<ToolServer>) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => server.dispatch(request).await,
            Err(err) => RpcResponse::err(Value::Null, PARSE_ERROR, format!("invalid JSON-RPC request: {err}")),
        };

        let mut serialized = serde_json::to_string(&response).unwrap_or_else(|_| {
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"failed to serialize response\"}}"
                .to_string()
        });
        serialized.push('\n');
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

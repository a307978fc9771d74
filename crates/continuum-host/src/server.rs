//! Tool registry and JSON-RPC dispatch table.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::facade::MemoryFacade;
use crate::protocol::types::{RpcRequest, RpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND};
use crate::tools;

pub struct ToolServer {
    facade: Arc<MemoryFacade>,
}

impl ToolServer {
    pub fn new(facade: Arc<MemoryFacade>) -> Self {
        Self { facade }
    }

    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.unwrap_or(Value::Null);

        if request.method == "tools/list" {
            let descriptors: Vec<Value> = tools::all_descriptors()
                .into_iter()
                .map(|d| {
                    json!({
                        "name": d.name,
                        "description": d.description,
                        "inputSchema": d.input_schema,
                    })
                })
                .collect();
            return RpcResponse::ok(id, json!({ "tools": descriptors }));
        }

        let result = match request.method.as_str() {
            "memory_recall" => tools::recall::call(&self.facade, request.params).await,
            "memory_store" => tools::store::call(&self.facade, request.params).await,
            "memory_forget" => tools::forget::call(&self.facade, request.params).await,
            "memory_checkpoint" => tools::checkpoint::call(&self.facade, request.params).await,
            "memory_prune" => tools::prune::call(&self.facade, request.params).await,
            other => {
                return RpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method: {other}"));
            }
        };

        match result {
            Ok(value) => RpcResponse::ok(id, value),
            Err(err) => RpcResponse::err(id, INTERNAL_ERROR, err.to_string()),
        }
    }
}

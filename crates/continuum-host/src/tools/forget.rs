//! `memory_forget` tool (§6).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::facade::{ForgetOutcome, MemoryFacade};
use crate::protocol::types::ToolDescriptor;

#[derive(Debug, Deserialize)]
struct ForgetParams {
    id: Option<String>,
    query: Option<String>,
}

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "memory_forget",
        description: "Delete a memory by id, or pass a query instead to get disambiguation candidates",
        input_schema: json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "query": {"type": "string"}
            }
        }),
    }
}

pub async fn call(facade: &MemoryFacade, params: Value) -> Result<Value> {
    let params: ForgetParams = serde_json::from_value(params)?;
    match facade.forget(params.id.as_deref(), params.query.as_deref()).await? {
        ForgetOutcome::Deleted(deleted) => Ok(json!({ "deleted": deleted })),
        ForgetOutcome::Candidates(hits) => Ok(json!({
            "deleted": false,
            "candidates": hits.into_iter().map(hit_to_json).collect::<Vec<_>>(),
        })),
    }
}

fn hit_to_json(hit: continuum_core::FusedHit) -> Value {
    json!({
        "id": hit.id,
        "text": hit.text,
        "category": hit.category.as_str(),
        "entity": hit.entity,
        "key": hit.key,
        "value": hit.value,
        "score": hit.score,
    })
}

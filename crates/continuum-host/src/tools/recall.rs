//! `memory_recall` tool (§6).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::facade::MemoryFacade;
use crate::protocol::types::ToolDescriptor;

#[derive(Debug, Deserialize)]
struct RecallParams {
    query: String,
    entity: Option<String>,
    limit: Option<usize>,
}

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "memory_recall",
        description: "Recall memories relevant to a query via hybrid lexical + vector search, \
                      or by exact entity when `entity` is set",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "entity": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["query"]
        }),
    }
}

pub async fn call(facade: &MemoryFacade, params: Value) -> Result<Value> {
    let params: RecallParams = serde_json::from_value(params)?;
    let hits = facade.recall(&params.query, params.entity.as_deref(), params.limit).await?;
    Ok(json!({ "hits": hits.into_iter().map(hit_to_json).collect::<Vec<_>>() }))
}

fn hit_to_json(hit: continuum_core::FusedHit) -> Value {
    json!({
        "id": hit.id,
        "text": hit.text,
        "category": hit.category.as_str(),
        "importance": hit.importance,
        "entity": hit.entity,
        "key": hit.key,
        "value": hit.value,
        "decayClass": hit.decay_class.as_str(),
        "expiresAt": hit.expires_at.as_seconds(),
        "score": hit.score,
    })
}

//! `memory_prune` tool (§6).

use serde_json::{json, Value};

use crate::error::Result;
use crate::facade::MemoryFacade;
use crate::protocol::types::ToolDescriptor;

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "memory_prune",
        description: "Hard-delete expired memories and apply the soft confidence decay pass",
        input_schema: json!({ "type": "object", "properties": {} }),
    }
}

pub async fn call(facade: &MemoryFacade, _params: Value) -> Result<Value> {
    let report = facade.prune().await?;
    Ok(json!({ "pruned": report.pruned, "confidenceDecayed": report.confidence_decayed }))
}

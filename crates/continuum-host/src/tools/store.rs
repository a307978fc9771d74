//! `memory_store` tool (§6).

use continuum_core::{Category, DecayClass, Expiry, StoreCandidate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::facade::MemoryFacade;
use crate::protocol::types::ToolDescriptor;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreParams {
    text: String,
    category: Option<String>,
    importance: Option<f64>,
    entity: Option<String>,
    key: Option<String>,
    value: Option<String>,
    source: Option<String>,
    decay_class: Option<String>,
}

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "memory_store",
        description: "Store a statement, optionally with structured entity/key/value fields",
        input_schema: json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "category": {"type": "string"},
                "importance": {"type": "number"},
                "entity": {"type": "string"},
                "key": {"type": "string"},
                "value": {"type": "string"},
                "source": {"type": "string"},
                "decayClass": {"type": "string"}
            },
            "required": ["text"]
        }),
    }
}

pub async fn call(facade: &MemoryFacade, params: Value) -> Result<Value> {
    let params: StoreParams = serde_json::from_value(params)?;
    let candidate = StoreCandidate {
        text: params.text,
        category: params.category.as_deref().map(Category::parse_name),
        importance: params.importance,
        entity: params.entity,
        key: params.key,
        value: params.value,
        source: params.source,
        decay_class: params.decay_class.as_deref().and_then(DecayClass::parse_name),
        expires_at: None::<Expiry>,
        search_tags: None,
    };
    let (entry, action) = facade.store(candidate).await?;
    Ok(json!({
        "id": entry.id,
        "category": entry.category.as_str(),
        "decayClass": entry.decay_class.as_str(),
        "expiresAt": entry.expires_at.as_seconds(),
        "action": action,
    }))
}

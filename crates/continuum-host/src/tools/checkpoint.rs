//! `memory_checkpoint` tool (§6).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::facade::{CheckpointPayload, MemoryFacade};
use crate::protocol::types::ToolDescriptor;

#[derive(Debug, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
enum CheckpointParams {
    Save {
        intent: String,
        state: String,
        expected_outcome: Option<String>,
        working_files: Option<Vec<String>>,
    },
    Restore {
        label: Option<String>,
    },
}

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "memory_checkpoint",
        description: "Save or restore a working-context checkpoint",
        input_schema: json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string"},
                "state": {"type": "string"},
                "expectedOutcome": {"type": "string"},
                "workingFiles": {"type": "array", "items": {"type": "string"}},
                "label": {"type": "string"}
            }
        }),
    }
}

pub async fn call(facade: &MemoryFacade, params: Value) -> Result<Value> {
    let params: CheckpointParams = serde_json::from_value(params)?;
    match params {
        CheckpointParams::Save { intent, state, expected_outcome, working_files } => {
            let saved_at = facade.clock_now();
            let entry = facade
                .checkpoint(CheckpointPayload {
                    intent,
                    state,
                    expected_outcome,
                    working_files,
                    saved_at,
                })
                .await?;
            Ok(json!({ "id": entry.id, "savedAt": saved_at }))
        }
        CheckpointParams::Restore { label } => {
            let restored = match label {
                Some(label) => facade.restore_checkpoint(&label).await?,
                None => facade.restore_latest_checkpoint().await?,
            };
            Ok(json!({ "checkpoint": restored }))
        }
    }
}

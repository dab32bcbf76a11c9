use crate::meta::{BrokerState, ToolEntry, json_result, meta_tool};
use rmcp::{ErrorData, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Validate every registered tool schema")]
pub struct HealthCheckRequest {}

pub fn tool() -> ToolEntry {
    ToolEntry {
        name: "broker_health_check",
        tool: meta_tool::<HealthCheckRequest>(
            "broker_health_check",
            "Health Check",
            "[Broker] Report how many registered tool schemas are valid, with a sample of broken ones and per-category counts.",
        ),
        handler: Arc::new(|_request, state| Box::pin(handle(state))),
    }
}

pub async fn handle(state: Arc<BrokerState>) -> Result<CallToolResult, ErrorData> {
    let report = state.broker.health_check();
    json_result(&report)
}

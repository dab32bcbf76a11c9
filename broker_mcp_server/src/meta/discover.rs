use crate::meta::{BrokerState, ToolEntry, json_result, meta_tool, parse_args};
use rmcp::{ErrorData, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Search tools by keyword")]
pub struct DiscoverRequest {
    #[schemars(description = "Free-text query matched against tool names, descriptions and category names")]
    pub query: String,
    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub limit: Option<i64>,
}

pub fn tool() -> ToolEntry {
    ToolEntry {
        name: "broker_discover",
        tool: meta_tool::<DiscoverRequest>(
            "broker_discover",
            "Discover Tools",
            "[Broker] Search every category for tools matching a keyword. Results are ranked, best match first.",
        ),
        handler: Arc::new(|request, state| Box::pin(handle(request, state))),
    }
}

pub async fn handle(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: DiscoverRequest = parse_args(request)?;
    let results = state.broker.discover(&args.query, args.limit);
    json_result(&serde_json::json!({
        "query": args.query,
        "count": results.len(),
        "results": results,
    }))
}

use crate::meta::{BrokerState, ToolEntry, json_result, meta_tool, parse_args};
use broker_core::BrokerError;
use rmcp::{ErrorData, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Invoke a provider tool through the broker")]
pub struct CallRequest {
    #[schemars(description = "Category key")]
    pub category: String,
    #[schemars(description = "Tool name")]
    pub tool: String,
    #[schemars(description = "Arguments matching the tool's input schema")]
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

pub fn tool() -> ToolEntry {
    ToolEntry {
        name: "broker_call",
        tool: meta_tool::<CallRequest>(
            "broker_call",
            "Call Tool",
            "[Broker] Call a tool by category and name. Fetch its schema with broker_get_tool_schema first.",
        ),
        handler: Arc::new(|request, state| Box::pin(handle(request, state))),
    }
}

pub async fn handle(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: CallRequest = parse_args(request)?;
    let arguments = args
        .arguments
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

    match state
        .broker
        .call(&args.category, &args.tool, arguments, state.providers.as_ref())
        .await
    {
        Ok(envelope) => json_result(&envelope),
        Err(e @ BrokerError::ToolNotFound { .. }) => {
            Err(ErrorData::invalid_params(e.to_string(), None))
        }
        Err(e) => {
            tracing::warn!("broker_call {}/{} failed: {}", args.category, args.tool, e);
            Err(ErrorData::internal_error(
                format!("Tool execution failed: {}", e),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::{json_of, state};
    use serde_json::json;

    #[tokio::test]
    async fn test_call_local_tool() {
        let result = handle(
            Some(json!({
                "category": "utility",
                "tool": "utility_sum",
                "arguments": {"a": 2, "b": 40}
            })),
            state(),
        )
        .await
        .unwrap();
        let v = json_of(&result);
        assert_eq!(v["category"], json!("utility"));
        assert_eq!(v["tool"], json!("utility_sum"));
        assert_eq!(v["result"]["content"][0]["text"], json!("42"));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let err = handle(
            Some(json!({"category": "stripe", "tool": "stripe_refund"})),
            state(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("stripe_refund"));
    }

    #[tokio::test]
    async fn test_call_registered_tool_without_provider() {
        let err = handle(
            Some(json!({"category": "google-workspace", "tool": "gmail_send_message"})),
            state(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert!(err.message.contains("gmail_send_message"));
    }
}

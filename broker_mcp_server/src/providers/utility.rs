//! Built-in `utility` provider.

use crate::providers::LocalTool;
use broker_core::ToolSchema;
use chrono::{FixedOffset, Local, Utc};
use rmcp::model::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Echo message request")]
pub struct EchoRequest {
    #[schemars(description = "Message to echo back")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Sum of two numbers")]
pub struct SumRequest {
    #[schemars(description = "First number")]
    pub a: f64,
    #[schemars(description = "Second number")]
    pub b: f64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Get current datetime")]
pub struct CurrentDatetimeRequest {
    #[schemars(description = "Offset from UTC in hours, e.g. 8 or -5; empty = server local time")]
    #[serde(default)]
    pub utc_offset_hours: Option<i32>,
}

pub fn all_tools() -> Vec<LocalTool> {
    vec![echo_tool(), sum_tool(), current_datetime_tool()]
}

fn schema_of<T: JsonSchema>(name: &str, description: &str) -> ToolSchema {
    let schema = schemars::schema_for!(T);
    ToolSchema::new(
        name,
        description,
        serde_json::to_value(schema).unwrap_or_default(),
    )
}

fn text_result(text: impl Into<String>) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(CallToolResult::success(vec![Content::text(text.into())]))?)
}

pub fn echo_tool() -> LocalTool {
    LocalTool {
        schema: schema_of::<EchoRequest>(
            "utility_echo",
            "Returns the exact input string provided. Useful for testing connectivity.",
        ),
        handler: Arc::new(|args| Box::pin(echo(args))),
    }
}

pub fn sum_tool() -> LocalTool {
    LocalTool {
        schema: schema_of::<SumRequest>("utility_sum", "Calculate the sum of two numbers"),
        handler: Arc::new(|args| Box::pin(sum(args))),
    }
}

pub fn current_datetime_tool() -> LocalTool {
    LocalTool {
        schema: schema_of::<CurrentDatetimeRequest>(
            "utility_current_datetime",
            "Get the current datetime at a fixed UTC offset or in server local time",
        ),
        handler: Arc::new(|args| Box::pin(current_datetime(args))),
    }
}

pub async fn echo(args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let args: EchoRequest = serde_json::from_value(args)?;
    text_result(args.message)
}

pub async fn sum(args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let args: SumRequest = serde_json::from_value(args)?;
    text_result((args.a + args.b).to_string())
}

pub async fn current_datetime(args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let args: CurrentDatetimeRequest = serde_json::from_value(args)?;
    let format = "%Y-%m-%d %H:%M:%S";
    let now = match args.utc_offset_hours {
        Some(hours) => {
            let offset = hours
                .checked_mul(3600)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| anyhow::anyhow!("UTC offset out of range: {}", hours))?;
            Utc::now().with_timezone(&offset).format(format).to_string()
        }
        None => Local::now().format(format).to_string(),
    };
    text_result(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sum() {
        let out = sum(json!({"a": 1.5, "b": 2})).await.unwrap();
        assert_eq!(out["content"][0]["text"], json!("3.5"));
    }

    #[tokio::test]
    async fn test_echo_rejects_missing_message() {
        assert!(echo(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_current_datetime() {
        let out = current_datetime(json!({"utc_offset_hours": 0})).await.unwrap();
        let text = out["content"][0]["text"].as_str().unwrap();
        assert_eq!(text.len(), "2026-01-01 00:00:00".len());

        assert!(current_datetime(json!({"utc_offset_hours": 99})).await.is_err());
        assert!(current_datetime(json!({"utc_offset_hours": 1_000_000})).await.is_err());
        assert!(current_datetime(json!({"utc_offset_hours": i32::MIN})).await.is_err());
        assert!(current_datetime(json!({})).await.is_ok());
    }

    #[test]
    fn test_schemas_are_named_by_category() {
        let names: Vec<String> = all_tools().into_iter().map(|t| t.schema.name).collect();
        assert_eq!(names, vec!["utility_echo", "utility_sum", "utility_current_datetime"]);
        for tool in all_tools() {
            assert!(broker_core::health::validate(&tool.schema).is_empty());
        }
    }
}

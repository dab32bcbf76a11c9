use crate::meta::{BrokerState, ToolEntry, json_result, meta_tool, parse_args};
use rmcp::{ErrorData, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "List tool categories")]
pub struct ListCategoriesRequest {
    #[schemars(description = "Also return disabled categories")]
    #[serde(default)]
    pub include_disabled: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "List tools in a category")]
pub struct ListToolsRequest {
    #[schemars(description = "Category key, e.g. stripe or google-workspace")]
    pub category: String,
    #[schemars(description = "Only tools in this subcategory, e.g. gmail")]
    #[serde(default)]
    pub subcategory: Option<String>,
    #[schemars(description = "Page size")]
    #[serde(default)]
    pub limit: Option<i64>,
    #[schemars(description = "Number of tools to skip")]
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "List subcategories of a category")]
pub struct ListSubcategoriesRequest {
    #[schemars(description = "Category key")]
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Fetch the full input schema of one tool")]
pub struct GetToolSchemaRequest {
    #[schemars(description = "Category key")]
    pub category: String,
    #[schemars(description = "Tool name as returned by broker_list_tools or broker_discover")]
    pub tool: String,
}

pub fn list_categories_tool() -> ToolEntry {
    ToolEntry {
        name: "broker_list_categories",
        tool: meta_tool::<ListCategoriesRequest>(
            "broker_list_categories",
            "List Categories",
            "[Broker] List the available tool categories with their tool counts and subcategories.",
        ),
        handler: Arc::new(|request, state| Box::pin(list_categories(request, state))),
    }
}

pub fn list_tools_tool() -> ToolEntry {
    ToolEntry {
        name: "broker_list_tools",
        tool: meta_tool::<ListToolsRequest>(
            "broker_list_tools",
            "List Tools",
            "[Broker] List tool names and descriptions in a category, optionally filtered by subcategory. Paginated; schemas are not included.",
        ),
        handler: Arc::new(|request, state| Box::pin(list_tools(request, state))),
    }
}

pub fn list_subcategories_tool() -> ToolEntry {
    ToolEntry {
        name: "broker_list_subcategories",
        tool: meta_tool::<ListSubcategoriesRequest>(
            "broker_list_subcategories",
            "List Subcategories",
            "[Broker] List the subcategories of a category (e.g. gmail, drive for google-workspace).",
        ),
        handler: Arc::new(|request, state| Box::pin(list_subcategories(request, state))),
    }
}

pub fn get_tool_schema_tool() -> ToolEntry {
    ToolEntry {
        name: "broker_get_tool_schema",
        tool: meta_tool::<GetToolSchemaRequest>(
            "broker_get_tool_schema",
            "Get Tool Schema",
            "[Broker] Get the full input schema of a tool before calling it with broker_call.",
        ),
        handler: Arc::new(|request, state| Box::pin(get_tool_schema(request, state))),
    }
}

pub async fn list_categories(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: ListCategoriesRequest = parse_args(request)?;
    let categories = state.broker.list_categories(args.include_disabled);
    // Only tools in the categories actually returned.
    let total_tools: usize = categories.iter().map(|c| c.tool_count).sum();
    json_result(&serde_json::json!({
        "categories": categories,
        "total_tools": total_tools,
    }))
}

pub async fn list_tools(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: ListToolsRequest = parse_args(request)?;
    let page = state.broker.list_tools(
        &args.category,
        args.subcategory.as_deref(),
        args.limit,
        args.offset,
    );
    json_result(&page)
}

pub async fn list_subcategories(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: ListSubcategoriesRequest = parse_args(request)?;
    let subcategories = state.broker.list_subcategories(&args.category);
    json_result(&serde_json::json!({
        "category": args.category,
        "subcategories": subcategories,
    }))
}

pub async fn get_tool_schema(
    request: Option<serde_json::Value>,
    state: Arc<BrokerState>,
) -> Result<CallToolResult, ErrorData> {
    let args: GetToolSchemaRequest = parse_args(request)?;
    match state.broker.get_tool_schema(&args.category, &args.tool) {
        Some(schema) => json_result(&schema),
        None => Ok(CallToolResult::error(vec![Content::text(format!(
            "Tool '{}' not found in category '{}'. Use broker_list_tools or broker_discover to find it.",
            args.tool, args.category
        ))])),
    }
}

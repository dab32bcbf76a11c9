//! Broker meta tools exposed over MCP.
//!
//! The client only ever sees these seven tools; every provider tool is reached
//! through `broker_list_*`, `broker_discover`, `broker_get_tool_schema` and
//! `broker_call`.

use broker_core::Broker;
use broker_core::schema::to_object;
use rmcp::{ErrorData, model::*};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::{future::Future, pin::Pin};

use crate::providers::ProviderHub;

pub mod call;
pub mod catalog;
pub mod discover;
pub mod health;

/// Shared by every connection.
pub struct BrokerState {
    pub broker: Arc<Broker>,
    pub providers: Arc<ProviderHub>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, ErrorData>> + Send>>;

pub type MetaHandler = Arc<dyn Fn(Option<serde_json::Value>, Arc<BrokerState>) -> HandlerFuture + Send + Sync>;

pub struct ToolEntry {
    pub name: &'static str,
    pub tool: Tool,
    pub handler: MetaHandler,
}

pub fn all_entries() -> Vec<ToolEntry> {
    vec![
        catalog::list_categories_tool(),
        catalog::list_tools_tool(),
        catalog::list_subcategories_tool(),
        catalog::get_tool_schema_tool(),
        discover::tool(),
        call::tool(),
        health::tool(),
    ]
}

/// Name -> handler table, built once per process.
pub struct MetaTools {
    tools: Vec<Tool>,
    handlers: HashMap<&'static str, MetaHandler>,
}

impl Default for MetaTools {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTools {
    pub fn new() -> Self {
        let mut tools = Vec::new();
        let mut handlers = HashMap::new();
        for entry in all_entries() {
            tools.push(entry.tool);
            handlers.insert(entry.name, entry.handler);
        }
        Self { tools, handlers }
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        args: Option<serde_json::Value>,
        state: Arc<BrokerState>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.handlers.get(name) {
            Some(handler) => handler(args, state).await,
            None => Err(ErrorData::invalid_params(
                format!("Unknown tool: {}", name),
                None,
            )),
        }
    }
}

pub fn meta_tool<T: schemars::JsonSchema>(name: &'static str, title: &str, description: &str) -> Tool {
    let schema = schemars::schema_for!(T);
    Tool {
        name: name.into(),
        title: Some(title.into()),
        description: Some(description.to_string().into()),
        input_schema: Arc::new(to_object(serde_json::to_value(schema).unwrap_or_default())),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

/// Missing arguments parse as an empty object so all-optional requests work.
pub fn parse_args<T: DeserializeOwned>(args: Option<serde_json::Value>) -> Result<T, ErrorData> {
    let value = args.unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| ErrorData::invalid_params(e.to_string(), None))
}

pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

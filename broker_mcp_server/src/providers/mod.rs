//! Provider side of the broker: the executor that actually runs tools.
//!
//! Local tools are dispatched through an explicit name -> handler table;
//! anything else is offered to the external MCP bridge.

use async_trait::async_trait;
use broker_core::{ToolExecutor, ToolSchema};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use crate::external::ExternalManager;

pub mod utility;

pub type ProviderHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send + Sync>;

pub struct LocalTool {
    pub schema: ToolSchema,
    pub handler: ProviderHandler,
}

#[derive(Default)]
pub struct ProviderHub {
    schemas: Vec<ToolSchema>,
    handlers: HashMap<String, ProviderHandler>,
    externals: Option<Arc<ExternalManager>>,
}

impl ProviderHub {
    pub fn with_utilities() -> Self {
        let mut hub = Self::default();
        for tool in utility::all_tools() {
            hub.register_local(tool);
        }
        hub
    }

    pub fn register_local(&mut self, tool: LocalTool) {
        if self.handlers.contains_key(&tool.schema.name) {
            tracing::warn!("Local tool '{}' registered twice, keeping the latest", tool.schema.name);
            self.schemas.retain(|s| s.name != tool.schema.name);
        }
        self.handlers.insert(tool.schema.name.clone(), tool.handler);
        self.schemas.push(tool.schema);
    }

    pub fn with_externals(mut self, externals: Arc<ExternalManager>) -> Self {
        self.externals = Some(externals);
        self
    }

    /// Schemas of the tools served in-process.
    pub fn local_schemas(&self) -> Vec<ToolSchema> {
        self.schemas.clone()
    }

    pub fn externals(&self) -> Option<&ExternalManager> {
        self.externals.as_deref()
    }
}

#[async_trait]
impl ToolExecutor for ProviderHub {
    async fn execute(&self, tool_name: &str, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        if let Some(handler) = self.handlers.get(tool_name) {
            return handler(args).await;
        }
        if let Some(externals) = &self.externals {
            if externals.handles(tool_name) {
                return externals.call(tool_name, args).await;
            }
        }
        anyhow::bail!("No provider is available for tool '{}'", tool_name)
    }
}

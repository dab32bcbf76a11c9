//! Bridge to external MCP servers.
//!
//! Each configured server contributes its tools under its own category. Tool
//! names are namespaced as `<category>_<remote name>` and calls are forwarded
//! to the server that owns them.

use anyhow::Result;
use broker_core::ToolSchema;
use broker_core::config::ExternalServer;
use broker_core::metadata::normalize_key;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, Tool, object},
    service::{RoleClient, RunningService},
};
use std::collections::HashMap;

pub struct BrokerClientHandler {
    info: ClientInfo,
}

impl Default for BrokerClientHandler {
    fn default() -> Self {
        let info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "tool-broker-external-client".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        };
        Self { info }
    }
}

impl rmcp::handler::client::ClientHandler for BrokerClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

struct ExternalClient {
    address: String,
    service: RunningService<RoleClient, BrokerClientHandler>,
}

/// Namespaced tool name -> (client index, remote tool name)
type RouteTable = HashMap<String, (usize, String)>;

#[derive(Default)]
pub struct ExternalManager {
    clients: Vec<ExternalClient>,
    routes: RouteTable,
    registrations: Vec<(String, ToolSchema)>,
}

impl ExternalManager {
    /// Connects to every server and snapshots its tool list. Servers that are
    /// unreachable or fail to list tools are skipped.
    pub async fn connect(servers: &[ExternalServer]) -> Self {
        let mut manager = Self::default();
        for server in servers {
            let category = normalize_key(&server.category);
            let service = match connect_one(server).await {
                Ok(service) => service,
                Err(e) => {
                    tracing::warn!("External server unavailable ({}): {}", server.address, e);
                    continue;
                }
            };
            let tools = match service.list_all_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::warn!("Listing tools failed ({}): {}", server.address, e);
                    continue;
                }
            };

            let idx = manager.clients.len();
            tracing::info!(
                "External server {} provides {} tools under '{}'",
                server.address,
                tools.len(),
                category
            );
            for tool in &tools {
                let schema = to_schema(&category, tool);
                manager
                    .routes
                    .insert(schema.name.clone(), (idx, tool.name.to_string()));
                manager.registrations.push((category.clone(), schema));
            }
            manager.clients.push(ExternalClient {
                address: server.address.clone(),
                service,
            });
        }
        manager
    }

    /// `(category, schema)` pairs to register explicitly; categories may
    /// contain the name separator, so they are not inferred from the name.
    pub fn registrations(&self) -> &[(String, ToolSchema)] {
        &self.registrations
    }

    pub fn handles(&self, tool_name: &str) -> bool {
        self.routes.contains_key(tool_name)
    }

    pub async fn call(&self, tool_name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let Some((idx, remote)) = self.routes.get(tool_name) else {
            anyhow::bail!("Not an external tool: {}", tool_name);
        };
        let Some(client) = self.clients.get(*idx) else {
            anyhow::bail!("External server for '{}' is gone", tool_name);
        };
        let arguments = match args {
            v if v.is_object() => Some(object(v)),
            _ => None,
        };
        let result = client
            .service
            .call_tool(CallToolRequestParam {
                name: remote.clone().into(),
                arguments,
            })
            .await
            .map_err(|e| anyhow::anyhow!("{} ({}): {}", tool_name, client.address, e))?;
        Ok(serde_json::to_value(result)?)
    }
}

async fn connect_one(server: &ExternalServer) -> Result<RunningService<RoleClient, BrokerClientHandler>> {
    let handler = BrokerClientHandler::default();
    if server.is_http() {
        let transport = StreamableHttpClientTransport::from_uri(server.address.as_str());
        Ok(rmcp::service::serve_client(handler, transport).await?)
    } else {
        let stream = tokio::net::TcpStream::connect(server.address.as_str()).await?;
        Ok(handler.serve(stream).await?)
    }
}

pub fn namespaced(category: &str, tool: &str) -> String {
    format!("{}_{}", category, tool)
}

fn to_schema(category: &str, tool: &Tool) -> ToolSchema {
    ToolSchema {
        name: namespaced(category, &tool.name),
        description: tool
            .description
            .as_deref()
            .unwrap_or_default()
            .to_string(),
        input_schema: (*tool.input_schema).clone(),
        subcategory: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_to_schema_namespaces_remote_tool() {
        let input = json!({"type": "object", "properties": {"q": {"type": "string"}}});
        let tool = Tool {
            name: "search".into(),
            title: None,
            description: Some("Search the web".into()),
            input_schema: Arc::new(broker_core::schema::to_object(input.clone())),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        };
        let schema = to_schema("web", &tool);
        assert_eq!(schema.name, "web_search");
        assert_eq!(schema.description, "Search the web");
        assert_eq!(serde_json::Value::Object(schema.input_schema), input);
    }

    #[tokio::test]
    async fn test_unreachable_servers_are_skipped() {
        let servers = vec![ExternalServer {
            category: "files".into(),
            address: "127.0.0.1:1".into(),
        }];
        let manager = ExternalManager::connect(&servers).await;
        assert!(manager.registrations().is_empty());
        assert!(!manager.handles("files_read"));
        assert!(manager.call("files_read", json!({})).await.is_err());
    }
}

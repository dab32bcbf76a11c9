use anyhow::Result;
use broker_core::config::BrokerConfig;
use broker_core::metadata::CategoryTable;
use broker_core::{Broker, ToolRegistry};
use rmcp::{
    ErrorData, ServerHandler, ServiceExt,
    model::*,
    service::{RequestContext, RoleServer},
};
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
mod external;
mod meta;
mod providers;
use crate::meta::{BrokerState, MetaTools};
use crate::providers::ProviderHub;

/// Bind address that switches the server to stdio transport.
const STDIO: &str = "stdio";

#[derive(Clone)]
pub struct BrokerService {
    state: Arc<BrokerState>,
    meta: Arc<MetaTools>,
}

impl BrokerService {
    pub fn new(state: Arc<BrokerState>, meta: Arc<MetaTools>) -> Self {
        Self { state, meta }
    }
}

impl ServerHandler for BrokerService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tool broker. Find tools with broker_list_categories, broker_list_tools or \
                 broker_discover, read their schema with broker_get_tool_schema, then run them \
                 with broker_call."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.meta.tools(),
            meta: None,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.meta
            .dispatch(
                &request.name,
                request.arguments.map(|v| v.into()),
                self.state.clone(),
            )
            .await
    }
}

/// Collects every provider's schemas into a sealed registry.
async fn bootstrap(config: &BrokerConfig) -> Arc<BrokerState> {
    let externals = Arc::new(external::ExternalManager::connect(&config.externals).await);
    let providers = ProviderHub::with_utilities().with_externals(externals.clone());

    let mut registry = ToolRegistry::new(CategoryTable::with_overrides(&config.categories));
    registry.bulk_register_tools(providers.local_schemas());
    for (category, schema) in externals.registrations() {
        registry.register_tool(category, schema.clone());
    }
    registry.seal();

    let broker = Broker::new(Arc::new(registry)).with_discovery(config.discovery.clone());
    Arc::new(BrokerState {
        broker: Arc::new(broker),
        providers: Arc::new(providers),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let config = BrokerConfig::load_from_env()?;
    let state = bootstrap(&config).await;
    let meta = Arc::new(MetaTools::new());

    let bind_addr = config.server.bind_addr.clone();
    if bind_addr == STDIO {
        tracing::info!("Tool broker serving on stdio");
        let server = BrokerService::new(state, meta)
            .serve(rmcp::transport::stdio())
            .await?;
        server.waiting().await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Tool broker listening on: {}", bind_addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        tracing::info!("Accepted connection from: {}", peer_addr);

        let service = BrokerService::new(state.clone(), meta.clone());
        tokio::spawn(async move {
            match service.serve(stream).await {
                Ok(server) => {
                    tracing::info!("Service initialized for {}", peer_addr);
                    if let Err(e) = server.waiting().await {
                        tracing::error!("Service error for {}: {:?}", peer_addr, e);
                    }
                    tracing::info!("Service closed for {}", peer_addr);
                }
                Err(e) => {
                    tracing::error!("Service run error for {}: {:?}", peer_addr, e);
                }
            }
        });
    }
}

pub mod broker;
pub mod config;
pub mod error;
pub mod health;
pub mod metadata;
pub mod registry;
pub mod schema;

pub use broker::{Broker, CallEnvelope, DiscoveredTool, ToolExecutor, ToolPage};
pub use error::{BrokerError, BrokerResult};
pub use registry::{RegistryPhase, ToolRegistry};
pub use schema::{CategoryInfo, ToolSchema, ToolSummary};

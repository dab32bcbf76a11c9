//! Broker error types.
//!
//! Lookups in the registry fail soft and return `Option`; these variants cover
//! the few places where a hard error is reported to the caller.

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Tool not found: '{tool}' in category '{category}'")]
    ToolNotFound { category: String, tool: String },

    /// Executor failure, relayed without reinterpretation.
    #[error("{0}")]
    Execution(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl BrokerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::ToolNotFound { .. })
    }
}

//! Broker configuration loaded from TOML.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrokerError, BrokerResult};
use crate::metadata::{CategoryMetadata, normalize_key};

pub const CONFIG_PATH_ENV: &str = "TOOL_BROKER_CONFIG";
pub const BIND_ADDR_ENV: &str = "TOOL_BROKER_BIND_ADDR";
pub const DEFAULT_CONFIG_PATH: &str = "config/broker.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub categories: Vec<CategoryOverride>,
    pub externals: Vec<ExternalServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9002".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Result cap for `discover` when the caller gives none.
    pub default_limit: usize,
    /// Page size for `list-tools` when the caller gives none.
    pub page_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryOverride {
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub subcategory_prefixes: Option<Vec<String>>,
}

impl CategoryOverride {
    pub fn apply(&self, target: &mut CategoryMetadata) {
        if let Some(name) = &self.display_name {
            target.display_name = name.clone();
        }
        if let Some(desc) = &self.description {
            target.description = desc.clone();
        }
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(prefixes) = &self.subcategory_prefixes {
            target.subcategory_prefixes = prefixes.iter().map(|p| p.to_lowercase()).collect();
        }
    }
}

/// An external MCP server whose tools are registered under `category`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalServer {
    pub category: String,
    /// `http(s)://` for streamable HTTP, `host:port` for raw TCP.
    pub address: String,
}

impl ExternalServer {
    pub fn is_http(&self) -> bool {
        self.address.starts_with("http://") || self.address.starts_with("https://")
    }
}

impl BrokerConfig {
    /// Loads from `TOOL_BROKER_CONFIG` (or the default path) and applies the
    /// bind address override. A missing file yields the defaults.
    pub fn load_from_env() -> BrokerResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = if Path::new(&path).exists() {
            Self::load(&path)?
        } else {
            tracing::warn!("Config file not found: {}, using defaults", path);
            Self::default()
        };
        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            cfg.server.bind_addr = addr;
        }
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> BrokerResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> BrokerResult<Self> {
        let cfg: BrokerConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        if self.discovery.default_limit == 0 || self.discovery.page_size == 0 {
            return Err(BrokerError::Config(
                "discovery.default_limit and discovery.page_size must be positive".into(),
            ));
        }

        for o in &self.categories {
            if normalize_key(&o.key).is_empty() {
                return Err(BrokerError::Config("category override with empty key".into()));
            }
        }

        let mut seen = HashSet::new();
        for ext in &self.externals {
            let key = normalize_key(&ext.category);
            if key.is_empty() {
                return Err(BrokerError::Config(format!(
                    "external server '{}' has an empty category",
                    ext.address
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(BrokerError::Config(format!(
                    "duplicate external category '{}'",
                    key
                )));
            }
            if ext.address.trim().is_empty() {
                return Err(BrokerError::Config(format!(
                    "external category '{}' has an empty address",
                    key
                )));
            }
            if ext.is_http() {
                Url::parse(&ext.address).map_err(|e| {
                    BrokerError::Config(format!("invalid address '{}': {}", ext.address, e))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let cfg = BrokerConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:9002");
        assert_eq!(cfg.discovery.default_limit, 20);
        assert_eq!(cfg.discovery.page_size, 50);
        assert!(cfg.categories.is_empty());
        assert!(cfg.externals.is_empty());
    }

    #[test]
    fn test_full_document() {
        let cfg = BrokerConfig::from_toml(
            r#"
            [server]
            bind_addr = "0.0.0.0:7000"

            [discovery]
            default_limit = 5

            [[categories]]
            key = "twilio"
            enabled = false

            [[externals]]
            category = "weather"
            address = "http://localhost:8000/mcp"

            [[externals]]
            category = "files"
            address = "127.0.0.1:9100"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:7000");
        assert_eq!(cfg.discovery.default_limit, 5);
        assert_eq!(cfg.discovery.page_size, 50);
        assert_eq!(cfg.categories[0].enabled, Some(false));
        assert!(cfg.externals[0].is_http());
        assert!(!cfg.externals[1].is_http());
    }

    #[test]
    fn test_duplicate_external_category_rejected() {
        let err = BrokerConfig::from_toml(
            r#"
            [[externals]]
            category = "files"
            address = "127.0.0.1:9100"

            [[externals]]
            category = "Files"
            address = "127.0.0.1:9101"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[test]
    fn test_bad_http_address_rejected() {
        let err = BrokerConfig::from_toml(
            r#"
            [[externals]]
            category = "web"
            address = "http://"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[test]
    fn test_zero_discovery_limits_rejected() {
        for doc in ["[discovery]\npage_size = 0", "[discovery]\ndefault_limit = 0"] {
            let err = BrokerConfig::from_toml(doc).unwrap_err();
            assert!(matches!(err, BrokerError::Config(_)), "{}", doc);
        }
    }

    #[test]
    fn test_malformed_toml() {
        let err = BrokerConfig::from_toml("[server\nbind_addr = 1").unwrap_err();
        assert!(matches!(err, BrokerError::Toml(_)));
    }
}

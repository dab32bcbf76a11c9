//! Broker façade.
//!
//! Wraps one sealed [`ToolRegistry`] and turns its data into the payloads of
//! the meta-operations (list categories, list tools, list subcategories, get
//! schema, discover, call, health check). Everything here is a read except
//! [`Broker::call`], which hands execution to a host-supplied
//! [`ToolExecutor`]; the broker itself knows nothing about providers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::health::{self, HealthReport};
use crate::metadata::normalize_key;
use crate::registry::{MatchField, RegistryPhase, ToolRegistry};
use crate::schema::{CategoryInfo, ToolSchema, ToolSummary};

/// Runs a tool for real. Supplied by the host process.
///
/// `tool_name` is the registered tool name, which is also the provider-side
/// dispatch key.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, args: Value) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> ToolExecutor for F
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn execute(&self, tool_name: &str, args: Value) -> anyhow::Result<Value> {
        (self)(tool_name.to_string(), args).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPage {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub tools: Vec<ToolSummary>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTool {
    pub category: String,
    pub name: String,
    pub description: String,
    pub score: u32,
    pub matched: Vec<MatchField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub category: String,
    pub tool: String,
    pub result: Value,
}

pub struct Broker {
    registry: Arc<ToolRegistry>,
    discovery: DiscoveryConfig,
}

impl Broker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        if registry.phase() != RegistryPhase::Serving {
            warn!("Broker created over a registry that has not been sealed");
        }
        Self {
            registry,
            discovery: DiscoveryConfig::default(),
        }
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Categories in creation order; disabled ones only when asked for.
    pub fn list_categories(&self, include_disabled: bool) -> Vec<CategoryInfo> {
        self.registry
            .get_categories()
            .into_iter()
            .filter(|c| include_disabled || c.enabled)
            .cloned()
            .collect()
    }

    /// One page of `{name, description}` entries. Out-of-range paging
    /// arguments are clamped, never rejected.
    pub fn list_tools(
        &self,
        category: &str,
        subcategory: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ToolPage {
        let subcategory = subcategory
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(normalize_key);
        let all = match &subcategory {
            Some(sub) => self.registry.list_tools_in_subcategory(category, sub),
            None => self.registry.list_tools_in_category(category),
        };

        let total = all.len();
        let offset = clamp_offset(offset).min(total);
        let limit = clamp_limit(limit, self.discovery.page_size);
        let tools: Vec<ToolSummary> = all.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + tools.len() < total;

        ToolPage {
            category: normalize_key(category),
            subcategory,
            tools,
            total,
            offset,
            limit,
            has_more,
        }
    }

    pub fn list_subcategories(&self, category: &str) -> Vec<String> {
        self.registry.get_subcategories(category)
    }

    pub fn get_tool_schema(&self, category: &str, tool_name: &str) -> Option<ToolSchema> {
        self.registry.get_tool_schema(category, tool_name).cloned()
    }

    /// Ranked free-text search across enabled categories.
    pub fn discover(&self, query: &str, limit: Option<i64>) -> Vec<DiscoveredTool> {
        let limit = clamp_limit(limit, self.discovery.default_limit);
        self.registry
            .search_where(query, limit, |c| c.enabled)
            .into_iter()
            .map(|hit| DiscoveredTool {
                category: hit.category.to_string(),
                name: hit.tool.name.clone(),
                description: hit.tool.description.clone(),
                score: hit.score,
                matched: hit.matched,
            })
            .collect()
    }

    /// Confirms the tool exists, then hands it to `executor`. An unknown tool
    /// is reported as `ToolNotFound` and the executor is never invoked.
    pub async fn call<E>(
        &self,
        category: &str,
        tool_name: &str,
        args: Value,
        executor: &E,
    ) -> BrokerResult<CallEnvelope>
    where
        E: ToolExecutor + ?Sized,
    {
        let Some(tool) = self.registry.get_tool_schema(category, tool_name) else {
            warn!("Call rejected, unknown tool '{}' in '{}'", tool_name, category);
            return Err(BrokerError::ToolNotFound {
                category: category.to_string(),
                tool: tool_name.to_string(),
            });
        };

        debug!("Executing '{}' from category '{}'", tool.name, category);
        let result = executor
            .execute(&tool.name, args)
            .await
            .map_err(BrokerError::Execution)?;

        Ok(CallEnvelope {
            category: normalize_key(category),
            tool: tool.name.clone(),
            result,
        })
    }

    pub fn health_check(&self) -> HealthReport {
        health::check(&self.registry)
    }
}

fn clamp_offset(offset: Option<i64>) -> usize {
    offset.map(|o| o.max(0) as usize).unwrap_or(0)
}

/// Missing or non-positive limits fall back to `default`.
fn clamp_limit(limit: Option<i64>, default: usize) -> usize {
    match limit {
        Some(l) if l > 0 => l as usize,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryOverride;
    use crate::metadata::{CategoryTable, GOOGLE_WORKSPACE};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tool(name: &str, description: &str) -> ToolSchema {
        ToolSchema::new(name, description, json!({"type": "object", "properties": {}}))
    }

    fn broker() -> Broker {
        let table = CategoryTable::with_overrides(&[CategoryOverride {
            key: "twilio".into(),
            display_name: None,
            description: None,
            enabled: Some(false),
            subcategory_prefixes: None,
        }]);
        let mut registry = ToolRegistry::new(table);
        registry.bulk_register_tools(vec![
            tool("stripe_create_customer", "Create a Stripe customer"),
            tool("stripe_list_charges", "List charges"),
            tool("stripe_refund", "Refund a charge"),
            tool("twilio_send_sms", "Send an SMS message"),
            tool("gmail_send_message", "Send an email message"),
            tool("drive_list_files", "List Drive files"),
        ]);
        registry.seal();
        Broker::new(Arc::new(registry))
    }

    #[test]
    fn test_list_categories_hides_disabled() {
        let b = broker();
        let names: Vec<String> = b.list_categories(false).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["stripe", GOOGLE_WORKSPACE]);
        assert_eq!(b.list_categories(true).len(), 3);

        let gw = b
            .list_categories(false)
            .into_iter()
            .find(|c| c.name == GOOGLE_WORKSPACE)
            .unwrap();
        assert_eq!(gw.subcategories, Some(vec!["gmail".into(), "drive".into()]));
    }

    #[test]
    fn test_list_tools_pagination() {
        let b = broker();
        let page = b.list_tools("stripe", None, Some(2), None);
        assert_eq!(page.total, 3);
        assert_eq!(page.tools.len(), 2);
        assert!(page.has_more);

        let page = b.list_tools("stripe", None, Some(2), Some(2));
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.tools[0].name, "stripe_refund");
        assert!(!page.has_more);
    }

    #[test]
    fn test_list_tools_clamps_arguments() {
        let b = broker();
        let page = b.list_tools("stripe", None, Some(-3), Some(-10));
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 50);
        assert_eq!(page.tools.len(), 3);

        let page = b.list_tools("stripe", None, Some(100), Some(99));
        assert_eq!(page.offset, 3);
        assert!(page.tools.is_empty());
        assert!(!page.has_more);

        let page = b.list_tools("unknown", None, None, None);
        assert_eq!(page.total, 0);
        assert!(page.tools.is_empty());
    }

    #[test]
    fn test_list_tools_by_subcategory() {
        let b = broker();
        let page = b.list_tools(GOOGLE_WORKSPACE, Some("Drive"), None, None);
        assert_eq!(page.subcategory.as_deref(), Some("drive"));
        assert_eq!(page.total, 1);
        assert_eq!(page.tools[0].name, "drive_list_files");
        assert_eq!(b.list_subcategories(GOOGLE_WORKSPACE), vec!["gmail", "drive"]);
    }

    #[test]
    fn test_get_tool_schema() {
        let b = broker();
        assert!(b.get_tool_schema("stripe", "stripe_refund").is_some());
        assert!(b.get_tool_schema("stripe", "refund").is_none());
    }

    #[test]
    fn test_discover_skips_disabled_categories() {
        let b = broker();
        let hits = b.discover("send", None);
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["gmail_send_message"]);
        assert_eq!(hits[0].category, GOOGLE_WORKSPACE);

        assert_eq!(b.discover("stripe", Some(1)).len(), 1);
        assert_eq!(b.discover("stripe", Some(-1)).len(), 3);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_never_executes() {
        let b = broker();
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = {
            let calls = calls.clone();
            move |_name: String, _args: Value| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Value::Null)
                }
            }
        };

        let err = b
            .call("stripe", "stripe_missing", json!({}), &spy)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("stripe_missing"));
        assert!(err.to_string().contains("stripe"));

        let err = b.call("nope", "nope_x", json!({}), &spy).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_passes_through_exactly_once() {
        let b = broker();
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = {
            let calls = calls.clone();
            move |name: String, args: Value| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(json!({"tool": name, "echo": args}))
                }
            }
        };

        let envelope = b
            .call("Stripe", "stripe_refund", json!({"charge": "ch_1"}), &spy)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(envelope.category, "stripe");
        assert_eq!(envelope.tool, "stripe_refund");
        assert_eq!(
            envelope.result,
            json!({"tool": "stripe_refund", "echo": {"charge": "ch_1"}})
        );
    }

    #[tokio::test]
    async fn test_executor_failure_is_relayed() {
        let b = broker();
        let failing = |_name: String, _args: Value| async move {
            Err::<Value, _>(anyhow::anyhow!("provider returned 502"))
        };
        let err = b
            .call("stripe", "stripe_refund", json!({}), &failing)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Execution(_)));
        assert_eq!(err.to_string(), "provider returned 502");
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_reads() {
        let b = Arc::new(broker());
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let entered_tx = Arc::new(std::sync::Mutex::new(Some(entered_tx)));
        let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));
        let gated = move |_name: String, _args: Value| {
            let entered_tx = entered_tx.lock().unwrap().take();
            let release_rx = release_rx.clone();
            async move {
                if let Some(tx) = entered_tx {
                    let _ = tx.send(());
                }
                if let Some(rx) = release_rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok::<_, anyhow::Error>(json!("done"))
            }
        };

        let caller = {
            let b = b.clone();
            tokio::spawn(async move { b.call("stripe", "stripe_refund", json!({}), &gated).await })
        };

        // The executor is now parked inside the call.
        entered_rx.await.unwrap();
        assert!(!caller.is_finished());
        assert_eq!(b.list_tools("stripe", None, None, None).total, 3);
        assert!(!b.discover("refund", None).is_empty());
        assert!(b.get_tool_schema("stripe", "stripe_refund").is_some());
        assert_eq!(b.health_check().total, 6);
        release_tx.send(()).unwrap();

        let envelope = caller.await.unwrap().unwrap();
        assert_eq!(envelope.result, json!("done"));
    }

    #[test]
    fn test_health_check_delegates() {
        let b = broker();
        let report = b.health_check();
        assert_eq!(report.total, 6);
        assert!(report.is_healthy());
    }
}

//! Tool registry.
//!
//! Indexes tool schemas by category and keeps per-category metadata in step
//! with registrations. The registry is append-only. It is filled during the
//! `Building` phase, sealed once, and then shared read-only (typically behind
//! an `Arc`) while serving.
//!
//! Invariants:
//! - `tools` and `categories` always have the same key set.
//! - `CategoryInfo::tool_count` equals the length of that category's tool list.
//! - Tool order inside a category is registration order.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metadata::{CategoryTable, NAME_SEPARATOR, default_metadata, normalize_key};
use crate::schema::{CategoryInfo, ToolSchema, ToolSummary};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

pub const SCORE_EXACT_NAME: u32 = 100;
pub const SCORE_NAME: u32 = 50;
pub const SCORE_DESCRIPTION: u32 = 20;
pub const SCORE_CATEGORY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryPhase {
    Building,
    Serving,
}

/// Outcome of a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// A tool with the same `(category, name)` existed and was overwritten in place.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Name,
    Description,
    Category,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub category: &'a str,
    pub tool: &'a ToolSchema,
    pub score: u32,
    pub matched: Vec<MatchField>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolRef<'a> {
    pub category: &'a str,
    pub tool: &'a ToolSchema,
}

#[derive(Debug, Clone)]
struct Slot {
    /// Global registration sequence, used as the search tie-breaker.
    seq: u64,
    schema: ToolSchema,
}

pub struct ToolRegistry {
    table: CategoryTable,
    tools: HashMap<String, Vec<Slot>>,
    categories: HashMap<String, CategoryInfo>,
    category_order: Vec<String>,
    next_seq: u64,
    phase: RegistryPhase,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}

impl ToolRegistry {
    pub fn new(table: CategoryTable) -> Self {
        Self {
            table,
            tools: HashMap::new(),
            categories: HashMap::new(),
            category_order: Vec::new(),
            next_seq: 0,
            phase: RegistryPhase::Building,
        }
    }

    pub fn phase(&self) -> RegistryPhase {
        self.phase
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// Returns the category, creating it from the metadata table (or from
    /// synthesised defaults) the first time the key is seen.
    pub fn ensure_category(&mut self, category: &str) -> &mut CategoryInfo {
        match self.categories.entry(normalize_key(category)) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let info = match self.table.get(e.key()) {
                    Some(meta) => CategoryInfo::from(meta),
                    None => {
                        debug!("Creating category '{}' with default metadata", e.key());
                        CategoryInfo::from(&default_metadata(e.key()))
                    }
                };
                self.tools.insert(e.key().clone(), Vec::new());
                self.category_order.push(e.key().clone());
                e.insert(info)
            }
        }
    }

    /// Appends `tool` to `category`. A second registration of the same
    /// `(category, name)` replaces the first one in place.
    pub fn register_tool(&mut self, category: &str, mut tool: ToolSchema) -> Registration {
        let key = normalize_key(category);
        self.ensure_category(&key);

        tool.subcategory = tool
            .subcategory
            .as_deref()
            .map(normalize_key)
            .filter(|s| !s.is_empty());
        if tool.subcategory.is_none() {
            let inferred = self.table.classify(&tool.name);
            if inferred.category == key {
                tool.subcategory = inferred.subcategory;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let list = self.tools.entry(key.clone()).or_default();
        let outcome = match list.iter_mut().find(|s| s.schema.name == tool.name) {
            Some(existing) => {
                warn!(
                    "Duplicate tool '{}' in category '{}', replacing previous registration",
                    tool.name, key
                );
                existing.schema = tool;
                Registration::Replaced
            }
            None => {
                list.push(Slot { seq, schema: tool });
                Registration::Inserted
            }
        };
        let count = list.len();

        if let Some(info) = self.categories.get_mut(&key) {
            info.tool_count = count;
        }

        if self.phase == RegistryPhase::Serving {
            warn!("Tool registered into '{}' after the registry was sealed", key);
            self.refresh_subcategories(&key);
        }
        outcome
    }

    /// Registers every tool under the category inferred from its name.
    pub fn bulk_register_tools(&mut self, tools: impl IntoIterator<Item = ToolSchema>) {
        let mut inserted = 0usize;
        let mut replaced = 0usize;
        for tool in tools {
            let category = self.table.extract_category(&tool.name);
            match self.register_tool(&category, tool) {
                Registration::Inserted => inserted += 1,
                Registration::Replaced => replaced += 1,
            }
        }
        info!(
            "Bulk registration: {} inserted, {} replaced, {} categories",
            inserted,
            replaced,
            self.categories.len()
        );
    }

    pub fn extract_category(&self, tool_name: &str) -> String {
        self.table.extract_category(tool_name)
    }

    pub fn extract_subcategory(&self, tool_name: &str) -> Option<String> {
        self.table.extract_subcategory(tool_name)
    }

    /// Distinct subcategories in first-seen order.
    pub fn get_subcategories(&self, category: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.slots(category)
            .iter()
            .filter_map(|s| s.schema.subcategory.as_ref())
            .filter(|sub| seen.insert(sub.as_str()))
            .cloned()
            .collect()
    }

    pub fn list_tools_in_category(&self, category: &str) -> Vec<ToolSummary> {
        self.slots(category)
            .iter()
            .map(|s| s.schema.summary())
            .collect()
    }

    pub fn list_tools_in_subcategory(&self, category: &str, subcategory: &str) -> Vec<ToolSummary> {
        let wanted = normalize_key(subcategory);
        self.slots(category)
            .iter()
            .filter(|s| s.schema.subcategory.as_deref() == Some(wanted.as_str()))
            .map(|s| s.schema.summary())
            .collect()
    }

    pub fn get_tool_schema(&self, category: &str, tool_name: &str) -> Option<&ToolSchema> {
        self.slots(category)
            .iter()
            .map(|s| &s.schema)
            .find(|t| t.name == tool_name)
    }

    /// Resolves `category_toolname`, widening the category prefix one segment
    /// at a time so multi-segment keys still resolve.
    pub fn get_tool_by_full_name(&self, full_name: &str) -> Option<ToolRef<'_>> {
        let split_points = full_name
            .char_indices()
            .filter(|(_, c)| *c == NAME_SEPARATOR)
            .map(|(i, _)| i);
        for idx in split_points {
            let candidate = normalize_key(&full_name[..idx]);
            let rest = &full_name[idx + NAME_SEPARATOR.len_utf8()..];
            let Some((key, _)) = self.categories.get_key_value(&candidate) else {
                continue;
            };
            let found = self
                .get_tool_schema(key, rest)
                .or_else(|| self.get_tool_schema(key, full_name));
            if let Some(tool) = found {
                return Some(ToolRef {
                    category: key.as_str(),
                    tool,
                });
            }
        }

        let inferred = self.table.extract_category(full_name);
        let (key, _) = self.categories.get_key_value(&inferred)?;
        self.get_tool_schema(key, full_name).map(|tool| ToolRef {
            category: key.as_str(),
            tool,
        })
    }

    pub fn search_tools(&self, query: &str, limit: usize) -> Vec<SearchHit<'_>> {
        self.search_where(query, limit, |_| true)
    }

    /// Ranked keyword search over categories accepted by `filter`.
    pub fn search_where<F>(&self, query: &str, limit: usize, filter: F) -> Vec<SearchHit<'_>>
    where
        F: Fn(&CategoryInfo) -> bool,
    {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<(u64, SearchHit<'_>)> = Vec::new();
        for key in &self.category_order {
            let Some(info) = self.categories.get(key) else {
                continue;
            };
            if !filter(info) {
                continue;
            }
            let category_matches = info.display_name.to_lowercase().contains(&needle);
            for slot in self.slots(key) {
                let tool = &slot.schema;
                let mut score = 0;
                let mut matched = Vec::new();

                let name = tool.name.to_lowercase();
                if name == needle {
                    score += SCORE_EXACT_NAME;
                    matched.push(MatchField::Name);
                } else if name.contains(&needle) {
                    score += SCORE_NAME;
                    matched.push(MatchField::Name);
                }
                if tool.description.to_lowercase().contains(&needle) {
                    score += SCORE_DESCRIPTION;
                    matched.push(MatchField::Description);
                }
                if category_matches {
                    score += SCORE_CATEGORY;
                    matched.push(MatchField::Category);
                }

                if score > 0 {
                    hits.push((
                        slot.seq,
                        SearchHit {
                            category: key.as_str(),
                            tool,
                            score,
                            matched,
                        },
                    ));
                }
            }
        }

        hits.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        hits.truncate(limit);
        hits.into_iter().map(|(_, hit)| hit).collect()
    }

    /// Categories in creation order.
    pub fn get_categories(&self) -> Vec<&CategoryInfo> {
        self.category_order
            .iter()
            .filter_map(|k| self.categories.get(k))
            .collect()
    }

    pub fn get_category(&self, name: &str) -> Option<&CategoryInfo> {
        self.categories.get(&normalize_key(name))
    }

    pub fn get_total_tool_count(&self) -> usize {
        self.tools.values().map(Vec::len).sum()
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.contains_key(&normalize_key(name))
    }

    pub fn has_tool(&self, category: &str, tool_name: &str) -> bool {
        self.get_tool_schema(category, tool_name).is_some()
    }

    /// Every registered tool with its category, in category then registration order.
    pub fn iter_tools(&self) -> impl Iterator<Item = ToolRef<'_>> {
        self.category_order.iter().flat_map(move |key| {
            self.slots(key).iter().map(move |s| ToolRef {
                category: key.as_str(),
                tool: &s.schema,
            })
        })
    }

    /// Recomputes the cached subcategory list of every category. Idempotent.
    pub fn update_category_subcategories(&mut self) {
        let keys: Vec<String> = self.category_order.clone();
        for key in keys {
            self.refresh_subcategories(&key);
        }
    }

    /// Refreshes the subcategory cache and switches to `Serving`.
    pub fn seal(&mut self) {
        self.update_category_subcategories();
        if self.phase == RegistryPhase::Building {
            self.phase = RegistryPhase::Serving;
            info!(
                "Tool registry sealed: {} tools in {} categories",
                self.get_total_tool_count(),
                self.categories.len()
            );
        }
    }

    fn refresh_subcategories(&mut self, key: &str) {
        let subs = self.get_subcategories(key);
        if let Some(info) = self.categories.get_mut(key) {
            info.subcategories = if subs.is_empty() { None } else { Some(subs) };
        }
    }

    fn slots(&self, category: &str) -> &[Slot] {
        self.tools
            .get(&normalize_key(category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

//! Category metadata table.
//!
//! Static defaults for the providers the broker knows about, merged at startup
//! with any `[[categories]]` overrides from the configuration file. Umbrella
//! categories (several tool-name prefixes folded under one key) are expressed
//! as data through `subcategory_prefixes`.

use std::collections::HashMap;

use crate::config::CategoryOverride;

/// Separator between the category prefix and the action in a tool name.
pub const NAME_SEPARATOR: char = '_';

/// Key used when a tool name has an empty prefix.
pub const UNCATEGORIZED: &str = "uncategorized";

pub const GOOGLE_WORKSPACE: &str = "google-workspace";

pub const GOOGLE_WORKSPACE_PREFIXES: &[&str] = &[
    "gmail", "drive", "calendar", "sheets", "docs", "slides", "forms", "tasks", "contacts",
    "chat", "meet",
];

struct StaticCategory {
    key: &'static str,
    display_name: &'static str,
    description: &'static str,
    enabled: bool,
    subcategory_prefixes: &'static [&'static str],
}

const BUILTIN_CATEGORIES: &[StaticCategory] = &[
    StaticCategory {
        key: "stripe",
        display_name: "Stripe",
        description: "Payments, customers, subscriptions and invoices",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: "twilio",
        display_name: "Twilio",
        description: "SMS, voice calls and phone number management",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: "resend",
        display_name: "Resend",
        description: "Transactional email delivery, domains and audiences",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: "supabase",
        display_name: "Supabase",
        description: "Postgres database, auth users and storage buckets",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: "cloudflare",
        display_name: "Cloudflare",
        description: "DNS records, zones, CDN cache and Workers",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: "context7",
        display_name: "Context7",
        description: "Up-to-date library documentation search",
        enabled: true,
        subcategory_prefixes: &[],
    },
    StaticCategory {
        key: GOOGLE_WORKSPACE,
        display_name: "Google Workspace",
        description: "Gmail, Drive, Calendar, Sheets, Docs and the rest of Google Workspace",
        enabled: true,
        subcategory_prefixes: GOOGLE_WORKSPACE_PREFIXES,
    },
    StaticCategory {
        key: "utility",
        display_name: "Utility",
        description: "Built-in helper tools served by the broker itself",
        enabled: true,
        subcategory_prefixes: &[],
    },
];

/// Metadata describing one category before any tool is registered into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMetadata {
    pub key: String,
    pub display_name: String,
    pub description: String,
    pub enabled: bool,
    pub subcategory_prefixes: Vec<String>,
}

impl From<&StaticCategory> for CategoryMetadata {
    fn from(s: &StaticCategory) -> Self {
        Self {
            key: s.key.to_string(),
            display_name: s.display_name.to_string(),
            description: s.description.to_string(),
            enabled: s.enabled,
            subcategory_prefixes: s
                .subcategory_prefixes
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Inferred placement of a tool derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub subcategory: Option<String>,
}

/// Runtime category table: static defaults plus configured overrides.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    entries: Vec<CategoryMetadata>,
    by_key: HashMap<String, usize>,
    umbrella_by_prefix: HashMap<String, String>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::from_entries(BUILTIN_CATEGORIES.iter().map(CategoryMetadata::from).collect())
    }
}

impl CategoryTable {
    /// Builtin table with `overrides` merged on top; unknown keys are appended.
    pub fn with_overrides(overrides: &[CategoryOverride]) -> Self {
        let mut entries: Vec<CategoryMetadata> =
            BUILTIN_CATEGORIES.iter().map(CategoryMetadata::from).collect();
        for o in overrides {
            let key = normalize_key(&o.key);
            match entries.iter_mut().find(|e| e.key == key) {
                Some(existing) => o.apply(existing),
                None => {
                    let mut fresh = default_metadata(&key);
                    o.apply(&mut fresh);
                    entries.push(fresh);
                }
            }
        }
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<CategoryMetadata>) -> Self {
        let mut by_key = HashMap::new();
        let mut umbrella_by_prefix = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_key.insert(entry.key.clone(), idx);
            for prefix in &entry.subcategory_prefixes {
                if let Some(previous) =
                    umbrella_by_prefix.insert(prefix.to_lowercase(), entry.key.clone())
                {
                    tracing::warn!(
                        "Prefix '{}' claimed by both '{}' and '{}', keeping '{}'",
                        prefix,
                        previous,
                        entry.key,
                        entry.key
                    );
                }
            }
        }
        Self {
            entries,
            by_key,
            umbrella_by_prefix,
        }
    }

    pub fn get(&self, key: &str) -> Option<&CategoryMetadata> {
        self.by_key
            .get(&normalize_key(key))
            .map(|idx| &self.entries[*idx])
    }

    pub fn entries(&self) -> &[CategoryMetadata] {
        &self.entries
    }

    /// Umbrella category folding `prefix`, if any.
    pub fn umbrella_for(&self, prefix: &str) -> Option<&str> {
        self.umbrella_by_prefix
            .get(&prefix.to_lowercase())
            .map(String::as_str)
    }

    /// Infers category and subcategory from a `<prefix>_<action>` tool name.
    pub fn classify(&self, tool_name: &str) -> Classification {
        let prefix = tool_name
            .split(NAME_SEPARATOR)
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if prefix.is_empty() {
            return Classification {
                category: UNCATEGORIZED.to_string(),
                subcategory: None,
            };
        }
        match self.umbrella_for(&prefix) {
            Some(umbrella) => Classification {
                category: umbrella.to_string(),
                subcategory: Some(prefix),
            },
            None => Classification {
                category: prefix,
                subcategory: None,
            },
        }
    }

    pub fn extract_category(&self, tool_name: &str) -> String {
        self.classify(tool_name).category
    }

    pub fn extract_subcategory(&self, tool_name: &str) -> Option<String> {
        self.classify(tool_name).subcategory
    }
}

/// Category keys are compared case-insensitively.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Metadata synthesised for a category the table has never heard of.
pub fn default_metadata(key: &str) -> CategoryMetadata {
    CategoryMetadata {
        key: key.to_string(),
        display_name: title_case(key),
        description: format!("Tools provided by {}", title_case(key)),
        enabled: true,
        subcategory_prefixes: Vec::new(),
    }
}

/// `google-workspace` -> `Google Workspace`
pub fn title_case(key: &str) -> String {
    key.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_plain_prefix() {
        let table = CategoryTable::default();
        let c = table.classify("acme_send");
        assert_eq!(c.category, "acme");
        assert_eq!(c.subcategory, None);
    }

    #[test]
    fn test_classify_google_workspace_prefixes() {
        let table = CategoryTable::default();
        let gmail = table.classify("gmail_send_message");
        assert_eq!(gmail.category, GOOGLE_WORKSPACE);
        assert_eq!(gmail.subcategory.as_deref(), Some("gmail"));

        let drive = table.classify("drive_create_file");
        assert_eq!(drive.category, GOOGLE_WORKSPACE);
        assert_eq!(drive.subcategory.as_deref(), Some("drive"));
    }

    #[test]
    fn test_classify_without_separator() {
        let table = CategoryTable::default();
        assert_eq!(table.extract_category("stripe"), "stripe");
        assert_eq!(table.extract_subcategory("stripe"), None);
        assert_eq!(table.extract_category("Gmail"), GOOGLE_WORKSPACE);
        assert_eq!(table.extract_category("_orphan"), UNCATEGORIZED);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("google-workspace"), "Google Workspace");
        assert_eq!(title_case("acme"), "Acme");
        assert_eq!(title_case("my_new provider"), "My New Provider");
    }

    #[test]
    fn test_overrides_merge_and_append() {
        let overrides = vec![
            CategoryOverride {
                key: "Stripe".into(),
                display_name: None,
                description: None,
                enabled: Some(false),
                subcategory_prefixes: None,
            },
            CategoryOverride {
                key: "atlassian".into(),
                display_name: Some("Atlassian".into()),
                description: None,
                enabled: None,
                subcategory_prefixes: Some(vec!["jira".into(), "confluence".into()]),
            },
        ];
        let table = CategoryTable::with_overrides(&overrides);

        let stripe = table.get("stripe").unwrap();
        assert!(!stripe.enabled);
        assert_eq!(stripe.display_name, "Stripe");

        let atlassian = table.get("atlassian").unwrap();
        assert_eq!(atlassian.display_name, "Atlassian");
        assert_eq!(table.umbrella_for("jira"), Some("atlassian"));
        assert_eq!(
            table.classify("confluence_create_page").subcategory.as_deref(),
            Some("confluence")
        );
    }
}

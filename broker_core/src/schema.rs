//! Tool and category data types shared by the registry and the broker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::metadata::CategoryMetadata;

pub type JsonObject = Map<String, Value>;

pub fn to_object(v: Value) -> JsonObject {
    match v {
        Value::Object(m) => m,
        _ => JsonObject::new(),
    }
}

/// Full description of one tool. Identity is `(category, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: JsonObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

fn empty_object_schema() -> JsonObject {
    let mut m = JsonObject::new();
    m.insert("type".into(), Value::String("object".into()));
    m.insert("properties".into(), Value::Object(JsonObject::new()));
    m
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: to_object(input_schema),
            subcategory: None,
        }
    }

    /// Tool taking no arguments.
    pub fn without_args(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_object_schema(),
            subcategory: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn required(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|req| req.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Schema-stripped projection used by broad listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub tool_count: usize,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<String>>,
}

impl From<&CategoryMetadata> for CategoryInfo {
    fn from(meta: &CategoryMetadata) -> Self {
        Self {
            name: meta.key.clone(),
            display_name: meta.display_name.clone(),
            description: meta.description.clone(),
            tool_count: 0,
            enabled: meta.enabled,
            subcategories: None,
        }
    }
}

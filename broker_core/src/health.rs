//! Schema health scan over every registered tool.
//!
//! Registration never rejects a malformed schema; this scan is where broken
//! entries surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ToolRegistry;
use crate::schema::ToolSchema;

pub const INVALID_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidTool {
    pub category: String,
    pub name: String,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total: usize,
    pub valid: usize,
    pub invalid_count: usize,
    pub invalid_sample: Vec<InvalidTool>,
    pub by_category: BTreeMap<String, usize>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.invalid_count == 0
    }
}

pub fn check(registry: &ToolRegistry) -> HealthReport {
    let mut report = HealthReport {
        total: 0,
        valid: 0,
        invalid_count: 0,
        invalid_sample: Vec::new(),
        by_category: BTreeMap::new(),
    };

    for category in registry.get_categories() {
        report
            .by_category
            .insert(category.name.clone(), category.tool_count);
    }

    for entry in registry.iter_tools() {
        report.total += 1;
        let problems = validate(entry.tool);
        if problems.is_empty() {
            report.valid += 1;
            continue;
        }
        report.invalid_count += 1;
        if report.invalid_sample.len() < INVALID_SAMPLE_SIZE {
            report.invalid_sample.push(InvalidTool {
                category: entry.category.to_string(),
                name: entry.tool.name.clone(),
                problems,
            });
        }
    }

    if report.invalid_count > 0 {
        tracing::warn!(
            "Health check found {} invalid tool schemas out of {}",
            report.invalid_count,
            report.total
        );
    }
    report
}

/// Structural problems with one schema; empty when valid.
pub fn validate(tool: &ToolSchema) -> Vec<String> {
    let mut problems = Vec::new();
    if tool.name.trim().is_empty() {
        problems.push("missing name".to_string());
    }
    if tool.description.trim().is_empty() {
        problems.push("missing description".to_string());
    }

    let schema = &tool.input_schema;
    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => problems.push(format!("inputSchema.type must be \"object\", got {}", other)),
        None => problems.push("inputSchema.type is missing".to_string()),
    }

    let properties = match schema.get("properties") {
        None => None,
        Some(Value::Object(props)) => Some(props),
        Some(_) => {
            problems.push("inputSchema.properties must be an object".to_string());
            None
        }
    };

    match schema.get("required") {
        None => {}
        Some(Value::Array(items)) => {
            for item in items {
                match item.as_str() {
                    Some(field) => {
                        if !properties.is_some_and(|p| p.contains_key(field)) {
                            problems.push(format!(
                                "required property '{}' is not declared in properties",
                                field
                            ));
                        }
                    }
                    None => problems.push(format!("inputSchema.required entry {} is not a string", item)),
                }
            }
        }
        Some(_) => problems.push("inputSchema.required must be an array".to_string()),
    }
    problems
}

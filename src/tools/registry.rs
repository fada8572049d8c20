//! The static operation table.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::args::{Arguments, FieldSpec};
use crate::Result;
use crate::context::ServerContext;

pub type HandlerFuture<'a> = BoxFuture<'a, Result<OperationPayload>>;

/// An operation handler: validated arguments in, payload or typed error out.
pub type Handler = for<'a> fn(&'a ServerContext, Arguments) -> HandlerFuture<'a>;

/// Successful operation output: a one-line summary and the engine value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationPayload {
    pub summary: String,
    pub data: Value,
}

impl OperationPayload {
    pub fn new(summary: impl Into<String>, data: Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }

    pub fn message(summary: impl Into<String>) -> Self {
        Self::new(summary, Value::Null)
    }

    /// Summary followed by the pretty-printed value, if any.
    pub fn text(&self) -> String {
        match &self.data {
            Value::Null => self.summary.clone(),
            data => {
                let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
                format!("{}\n{}", self.summary, pretty)
            }
        }
    }
}

/// One row of the operation table.
#[derive(Debug)]
pub struct OperationSpec {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
    pub handler: Handler,
}

impl OperationSpec {
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                let mut schema = field.ty.schema();
                schema["description"] = json!(field.description);
                (field.name.to_string(), schema)
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// An operation as advertised to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Lookup over the full catalogue, in declaration order.
#[derive(Debug)]
pub struct OperationRegistry {
    ordered: Vec<&'static OperationSpec>,
    by_name: HashMap<&'static str, &'static OperationSpec>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        let tables: [&'static [OperationSpec]; 9] = [
            super::connection::OPERATIONS,
            super::monitoring::OPERATIONS,
            super::indexes::OPERATIONS,
            super::documents::OPERATIONS,
            super::settings::OPERATIONS,
            super::search::OPERATIONS,
            super::tasks::OPERATIONS,
            super::keys::OPERATIONS,
            super::chat::OPERATIONS,
        ];
        let ordered: Vec<&'static OperationSpec> = tables.into_iter().flatten().collect();
        let by_name = ordered.iter().map(|spec| (spec.name, *spec)).collect();
        Self { ordered, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'static OperationSpec> {
        self.by_name.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ordered.iter().map(|spec| spec.name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.ordered.iter().map(|spec| spec.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_is_complete() {
        let registry = OperationRegistry::new();
        assert_eq!(registry.len(), 26);

        let names: HashSet<&str> = registry.names().collect();
        assert_eq!(names.len(), 26, "operation names must be unique");
        for name in [
            "get-connection-settings",
            "update-connection-settings",
            "health-check",
            "get-version",
            "get-stats",
            "get-health-status",
            "get-index-metrics",
            "get-system-info",
            "create-index",
            "list-indexes",
            "delete-index",
            "get-documents",
            "add-documents",
            "get-settings",
            "update-settings",
            "search",
            "get-task",
            "get-tasks",
            "cancel-tasks",
            "get-keys",
            "create-key",
            "delete-key",
            "create-chat-completion",
            "get-chat-workspaces",
            "get-chat-workspace-settings",
            "update-chat-workspace-settings",
        ] {
            assert!(names.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_input_schema() {
        let registry = OperationRegistry::new();
        let schema = registry.get("search").unwrap().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["properties"]["vector"]["items"]["type"], "number");
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_definition_serializes_camel_case() {
        let registry = OperationRegistry::new();
        let def = serde_json::to_value(registry.get("health-check").unwrap().definition()).unwrap();
        assert!(def.get("inputSchema").is_some());
        assert_eq!(def["name"], "health-check");
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(
            OperationPayload::message("Meilisearch is available").text(),
            "Meilisearch is available"
        );
        let payload = OperationPayload::new("Indexes:", json!({"total": 0}));
        assert_eq!(payload.text(), "Indexes:\n{\n  \"total\": 0\n}");
    }
}

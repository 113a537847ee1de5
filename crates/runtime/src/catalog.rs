//! Tool catalog: the provider's tools in the shape the model expects.
//!
//! Everything here is pure; fetching happens in the tool host.

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use crate::model::ToolSpec;
use crate::{Error, Result};

/// A tool as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<mcp::Tool> for ToolDefinition {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

impl From<ToolSpec> for ToolDefinition {
    fn from(spec: ToolSpec) -> Self {
        Self {
            name: spec.name,
            description: spec.description,
            input_schema: spec.parameters,
        }
    }
}

impl ToolDefinition {
    /// The function-calling schema for this tool.
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    /// Check `arguments` against the top level of the input schema.
    ///
    /// Covers `required` and primitive `type` declarations of each property;
    /// nested schemas are not descended into.
    pub fn validate_arguments(&self, arguments: &Map<String, Value>) -> std::result::Result<(), String> {
        if let Some(required) = self.input_schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !arguments.contains_key(key) {
                    return Err(format!("missing required argument `{key}`"));
                }
            }
        }

        let Some(properties) = self.input_schema.get("properties").and_then(Value::as_object)
        else {
            return Ok(());
        };

        for (key, value) in arguments {
            let Some(declared) = properties.get(key).and_then(|p| p.get("type")) else {
                continue;
            };
            let allowed: Vec<&str> = match declared {
                Value::String(ty) => vec![ty.as_str()],
                Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            if !allowed.is_empty() && !allowed.iter().any(|ty| matches_type(ty, value)) {
                return Err(format!(
                    "argument `{key}` should be {}, got {value}",
                    allowed.join(" or ")
                ));
            }
        }
        Ok(())
    }
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        // JSON Schema counts `3.0` as an integer.
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        "number" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown keywords are not ours to reject.
        _ => true,
    }
}

/// An ordered snapshot of tool definitions with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Build a catalog, preserving order and rejecting duplicate names.
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::DuplicateToolName(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// Build a catalog from a provider's `tools/list` answer.
    pub fn from_tools(tools: Vec<mcp::Tool>) -> Result<Self> {
        Self::new(tools.into_iter().map(ToolDefinition::from).collect())
    }

    /// Rebuild a catalog from model-facing specs.
    pub fn from_specs(specs: Vec<ToolSpec>) -> Result<Self> {
        Self::new(specs.into_iter().map(ToolDefinition::from).collect())
    }

    /// Function-calling schemas in provider order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDefinition::to_spec).collect()
    }

    /// The catalog as `{"type": "function", "function": {..}}` objects.
    pub fn function_schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect()
    }

    /// Inverse of [`ToolCatalog::function_schemas`].
    pub fn from_function_schemas(schemas: Vec<Value>) -> Result<Self> {
        let specs = schemas
            .into_iter()
            .map(|schema| {
                if schema.get("type").and_then(Value::as_str) != Some("function") {
                    return Err(Error::InvalidFunctionSchema(format!(
                        "expected type \"function\" in {schema}"
                    )));
                }
                let function = schema.get("function").cloned().unwrap_or(Value::Null);
                serde_json::from_value::<ToolSpec>(function)
                    .map_err(|e| Error::InvalidFunctionSchema(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_specs(specs)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arithmetic(name: &str) -> mcp::Tool {
        mcp::Tool {
            name: name.to_string(),
            description: Some(format!("{name} two numbers")),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer"}
                },
                "required": ["a", "b"]
            }),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn preserves_provider_order() {
        let catalog =
            ToolCatalog::from_tools(vec![arithmetic("multiply"), arithmetic("add")]).unwrap();
        assert_eq!(catalog.names(), ["multiply", "add"]);

        let specs = catalog.specs();
        assert_eq!(specs[0].name, "multiply");
        assert_eq!(specs[1].parameters["required"], json!(["a", "b"]));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ToolCatalog::from_tools(vec![arithmetic("add"), arithmetic("add")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateToolName(ref name) if name == "add"));
    }

    #[test]
    fn missing_description_is_empty() {
        let mut tool = arithmetic("add");
        tool.description = None;
        let catalog = ToolCatalog::from_tools(vec![tool]).unwrap();
        assert_eq!(catalog.specs()[0].description, "");
    }

    #[test]
    fn spec_round_trip_is_lossless() {
        let catalog =
            ToolCatalog::from_tools(vec![arithmetic("add"), arithmetic("multiply")]).unwrap();
        let rebuilt = ToolCatalog::from_specs(catalog.specs()).unwrap();
        assert_eq!(rebuilt, catalog);
    }

    #[test]
    fn function_schema_shape() {
        let catalog = ToolCatalog::from_tools(vec![arithmetic("add")]).unwrap();
        let schemas = catalog.function_schemas();
        assert_eq!(
            schemas[0],
            json!({
                "type": "function",
                "function": {
                    "name": "add",
                    "description": "add two numbers",
                    "parameters": arithmetic("add").input_schema,
                }
            })
        );

        let rebuilt = ToolCatalog::from_function_schemas(schemas).unwrap();
        assert_eq!(rebuilt, catalog);
    }

    #[test]
    fn rejects_non_function_schema() {
        let err = ToolCatalog::from_function_schemas(vec![json!({"type": "retrieval"})])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFunctionSchema(_)));
    }

    #[test]
    fn validates_required_and_types() {
        let add = ToolDefinition::from(arithmetic("add"));

        assert!(add.validate_arguments(&args(json!({"a": 3, "b": 4}))).is_ok());

        let err = add.validate_arguments(&args(json!({"a": 3}))).unwrap_err();
        assert!(err.contains("`b`"));

        assert!(add.validate_arguments(&args(json!({"a": 3.0, "b": 4}))).is_ok());
        let err = add
            .validate_arguments(&args(json!({"a": 3.5, "b": 4})))
            .unwrap_err();
        assert!(err.contains("integer"));

        let err = add
            .validate_arguments(&args(json!({"a": "3", "b": 4})))
            .unwrap_err();
        assert!(err.contains("integer"));

        // Extra arguments are left for the provider to judge.
        assert!(
            add.validate_arguments(&args(json!({"a": 1, "b": 2, "c": 3})))
                .is_ok()
        );
    }

    #[test]
    fn validates_type_unions() {
        let tool = ToolDefinition {
            name: "greet".into(),
            description: String::new(),
            input_schema: json!({
                "type": "object",
                "properties": {"name": {"type": ["string", "null"]}}
            }),
        };
        assert!(tool.validate_arguments(&args(json!({"name": null}))).is_ok());
        assert!(tool.validate_arguments(&args(json!({"name": 5}))).is_err());
    }
}

//! Tool registry
//!
//! Named actions with a typed argument schema. Arguments are checked against
//! the schema before the handler runs, so a malformed call never reaches the
//! gateway.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::protocol::ToolDefinition;
use crate::error::{Result, SharePointError};
use crate::shaper::Entry;

/// JSON type of a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgType {
    fn json_name(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Object => "object",
            ArgType::Array => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Number => value.is_number(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::Object => value.is_object(),
            ArgType::Array => value.is_array(),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
struct ArgSpec {
    name: String,
    arg_type: ArgType,
    required: bool,
    description: String,
}

/// Argument schema of a tool
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    fields: Vec<ArgSpec>,
}

impl ArgumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, arg_type: ArgType, description: &str) -> Self {
        self.field(name, arg_type, true, description)
    }

    pub fn optional(self, name: &str, arg_type: ArgType, description: &str) -> Self {
        self.field(name, arg_type, false, description)
    }

    fn field(mut self, name: &str, arg_type: ArgType, required: bool, description: &str) -> Self {
        self.fields.push(ArgSpec {
            name: name.to_string(),
            arg_type,
            required,
            description: description.to_string(),
        });
        self
    }

    /// Check `args` against the schema; `null` counts as no arguments
    pub fn validate(&self, args: &Value) -> Result<()> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(object) => object,
            other => {
                return Err(SharePointError::InvalidArguments(format!(
                    "arguments must be an object, got {}",
                    describe(other)
                )))
            }
        };

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SharePointError::InvalidArguments(format!(
                        "missing required field '{}'",
                        field.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.arg_type.accepts(value) => {
                    return Err(SharePointError::InvalidArguments(format!(
                        "field '{}' must be {}, got {}",
                        field.name,
                        field.arg_type.json_name(),
                        describe(value)
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.fields.iter().any(|field| &field.name == *key))
        {
            return Err(SharePointError::InvalidArguments(format!(
                "unknown field '{}'",
                unknown
            )));
        }

        Ok(())
    }

    /// JSON Schema advertised in `tools/list`
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    json!({"type": field.arg_type.json_name(), "description": field.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|spec| spec.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// Deserialize already-validated arguments into a typed struct
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| SharePointError::InvalidArguments(e.to_string()))
}

/// What a tool handler hands back
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Entries(Vec<Entry>),
    Entry(Entry),
}

impl ToolOutput {
    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            ToolOutput::Entries(entries) => entries,
            ToolOutput::Entry(entry) => vec![entry],
        }
    }
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync>;

struct RegisteredTool {
    name: String,
    description: String,
    schema: ArgumentSchema,
    handler: Handler,
}

/// Registry of invocable tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        schema: ArgumentSchema,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        if self.tools.iter().any(|t| t.name == name) {
            return Err(SharePointError::Config(format!(
                "tool '{}' registered twice",
                name
            )));
        }

        self.tools.push(RegisteredTool {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler: Arc::new(move |args| handler(args).boxed()),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and invoke a tool
    pub async fn call(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SharePointError::NoSuchTool(name.to_string()))?;

        tool.schema.validate(&args)?;
        tracing::debug!(tool = %tool.name, "invoking tool");
        (tool.handler)(args).await
    }

    /// Definitions for `tools/list`
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.schema.to_json_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema() -> ArgumentSchema {
        ArgumentSchema::new()
            .required("query", ArgType::String, "Search text")
            .optional("limit", ArgType::Integer, "Maximum results")
    }

    #[test]
    fn test_validate_accepts_good_arguments() {
        assert!(schema().validate(&json!({"query": "report"})).is_ok());
        assert!(schema().validate(&json!({"query": "", "limit": 5})).is_ok());
    }

    #[test]
    fn test_validate_reports_violations() {
        let cases = [
            (json!({}), "missing required field 'query'"),
            (json!(null), "missing required field 'query'"),
            (json!({"query": 3}), "field 'query' must be string, got number"),
            (json!({"query": "x", "limit": 1.5}), "field 'limit' must be integer"),
            (json!({"query": "x", "extra": true}), "unknown field 'extra'"),
            (json!(["query"]), "arguments must be an object"),
        ];
        for (args, expected) in cases {
            match schema().validate(&args) {
                Err(SharePointError::InvalidArguments(message)) => {
                    assert!(message.contains(expected), "{} !~ {}", message, expected)
                }
                other => panic!("expected InvalidArguments for {}, got {:?}", args, other),
            }
        }
    }

    #[test]
    fn test_json_schema_shape() {
        let rendered = schema().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["query"]["type"], "string");
        assert_eq!(rendered["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_invalid_call_never_reaches_handler() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invoked);

        let mut registry = ToolRegistry::new();
        registry
            .register("search", "Search", schema(), move |_args| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(ToolOutput::Entries(Vec::new())) }
            })
            .unwrap();

        assert!(matches!(
            registry.call("search", json!({})).await,
            Err(SharePointError::InvalidArguments(_))
        ));
        assert!(matches!(
            registry.call("nope", json!({})).await,
            Err(SharePointError::NoSuchTool(_))
        ));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        registry.call("search", json!({"query": "a"})).await.unwrap();
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
    }
}

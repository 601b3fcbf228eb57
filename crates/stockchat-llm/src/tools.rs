//! Functions offered to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and JSON-schema parameters of one callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Parameters listed under `required`, in declaration order
    pub fn required_parameters(&self) -> Vec<&str> {
        match self.input_schema.get("required") {
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Small builders for parameter schemas
///
/// ```
/// use stockchat_llm::tools::schema;
/// use serde_json::json;
///
/// let params = schema::object(
///     json!({
///         "ticker": schema::string("Stock ticker symbol (e.g., AAPL)"),
///         "window": schema::bare("integer"),
///     }),
///     vec!["ticker", "window"],
/// );
/// assert_eq!(params["required"][1], "window");
/// ```
pub mod schema {
    use serde_json::{Value, json};

    pub fn object(properties: Value, required: Vec<&str>) -> Value {
        json!({ "type": "object", "properties": properties, "required": required })
    }

    /// `string` property with a description
    pub fn string(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    /// Property carrying only its type
    pub fn bare(type_name: &str) -> Value {
        json!({ "type": type_name })
    }
}

//! Parameter declarations and their JSON Schema projection.
//!
//! An extraction declares what it wants back as an ordered list of
//! [`Parameter`]s. The list is projected into the JSON Schema of the
//! single `extract` function the model is forced to call, and the same
//! schema validates the final arguments.
//!
//! Parameters deserialize from the compact wire form used by front-end
//! action declarations, so they can be loaded from JSON as well as built
//! in code:
//!
//! ```rust
//! use llm_extract::schema::{Parameter, ParameterType, parameters_to_json_schema};
//!
//! let params: Vec<Parameter> = serde_json::from_str(r#"[
//!     {"name": "city", "description": "City name"},
//!     {"name": "tags", "type": "string[]", "required": false}
//! ]"#).unwrap();
//! assert_eq!(params[1].kind, ParameterType::StringArray);
//!
//! let schema = parameters_to_json_schema(&params);
//! assert_eq!(schema.as_value()["required"], serde_json::json!(["city"]));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::LlmError;

/// The declared type of a [`Parameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterType {
    /// A JSON string. The default.
    #[default]
    #[serde(rename = "string")]
    String,
    /// A JSON number.
    #[serde(rename = "number")]
    Number,
    /// A JSON boolean.
    #[serde(rename = "boolean")]
    Boolean,
    /// A JSON object described by the parameter's `attributes`.
    #[serde(rename = "object")]
    Object,
    /// An array of strings.
    #[serde(rename = "string[]")]
    StringArray,
    /// An array of numbers.
    #[serde(rename = "number[]")]
    NumberArray,
    /// An array of booleans.
    #[serde(rename = "boolean[]")]
    BooleanArray,
    /// An array of objects described by the parameter's `attributes`.
    #[serde(rename = "object[]")]
    ObjectArray,
}

impl ParameterType {
    fn scalar_name(self) -> &'static str {
        match self {
            Self::String | Self::StringArray => "string",
            Self::Number | Self::NumberArray => "number",
            Self::Boolean | Self::BooleanArray => "boolean",
            Self::Object | Self::ObjectArray => "object",
        }
    }

    fn is_array(self) -> bool {
        matches!(
            self,
            Self::StringArray | Self::NumberArray | Self::BooleanArray | Self::ObjectArray
        )
    }
}

/// One named, typed value the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Property name in the resulting argument map.
    pub name: String,
    /// The declared type.
    #[serde(rename = "type", default)]
    pub kind: ParameterType,
    /// Description shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the property must be present in the final arguments.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Allowed values for string parameters.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Nested properties for `object` and `object[]` parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Parameter>,
}

fn default_required() -> bool {
    true
}

impl Parameter {
    /// A required parameter of the given type with no description.
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
            enum_values: None,
            attributes: Vec::new(),
        }
    }

    /// Shorthand for a required string parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String)
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the parameter optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts a string parameter to the given values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the nested properties of an object (or object array).
    #[must_use]
    pub fn attributes(mut self, attributes: Vec<Parameter>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// The JSON Schema of a function's arguments.
///
/// Produced by [`parameters_to_json_schema`] and sent as the `extract`
/// function's parameters; the extractor checks the final arguments
/// against the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Wraps a schema document as is.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// The schema document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Checks `value` against the schema.
    ///
    /// # Errors
    ///
    /// [`LlmError::SchemaValidation`] listing every violation, or
    /// [`LlmError::InvalidRequest`] when the document is not a usable
    /// schema.
    pub fn validate(&self, value: &Value) -> Result<(), LlmError> {
        let validator = jsonschema::validator_for(&self.0)
            .map_err(|e| LlmError::InvalidRequest(format!("unusable parameter schema: {e}")))?;
        let violations: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
        if violations.is_empty() {
            return Ok(());
        }
        Err(LlmError::SchemaValidation {
            message: violations.join("; "),
            schema: self.0.clone(),
            actual: value.clone(),
        })
    }
}

/// Projects a parameter list into an object JSON Schema.
///
/// The result is `{"type": "object", "properties": {..}, "required": [..]}`.
/// `required` lists names in declaration order.
pub fn parameters_to_json_schema(parameters: &[Parameter]) -> JsonSchema {
    JsonSchema::new(object_schema(parameters))
}

fn object_schema(parameters: &[Parameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in parameters {
        properties.insert(param.name.clone(), property_schema(param));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn property_schema(param: &Parameter) -> Value {
    let description = param.description.as_deref();

    let item = match param.kind {
        ParameterType::Object | ParameterType::ObjectArray => object_schema(&param.attributes),
        ParameterType::String | ParameterType::StringArray => {
            let mut s = Map::new();
            s.insert("type".into(), json!("string"));
            if let Some(values) = &param.enum_values {
                s.insert("enum".into(), json!(values));
            }
            Value::Object(s)
        }
        other => json!({ "type": other.scalar_name() }),
    };

    let mut schema = if param.kind.is_array() {
        let mut s = Map::new();
        s.insert("type".into(), json!("array"));
        s.insert("items".into(), item);
        s
    } else {
        match item {
            Value::Object(s) => s,
            _ => Map::new(),
        }
    };

    if let Some(description) = description {
        schema.insert("description".into(), json!(description));
    }
    Value::Object(schema)
}

//! Declarative structured-output schema.
//!
//! A `StructuredSchema` describes one flat JSON object: its properties,
//! their value kinds, nullability and which keys must always be emitted.
//! Backends render it into their provider's dialect:
//!   Gemini          - OpenAPI-subset `responseSchema` (upper-case types, `nullable`)
//!   OpenAI-style    - standard JSON Schema (`["string", "null"]` unions)

use serde_json::{json, Map, Value};

/// Value kind of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<PropertyKind>),
}

impl PropertyKind {
    fn gemini_type(&self) -> &'static str {
        match self {
            PropertyKind::String   => "STRING",
            PropertyKind::Number   => "NUMBER",
            PropertyKind::Integer  => "INTEGER",
            PropertyKind::Boolean  => "BOOLEAN",
            PropertyKind::Array(_) => "ARRAY",
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            PropertyKind::String   => "string",
            PropertyKind::Number   => "number",
            PropertyKind::Integer  => "integer",
            PropertyKind::Boolean  => "boolean",
            PropertyKind::Array(_) => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaProperty {
    pub name: String,
    pub kind: PropertyKind,
    pub description: String,
    /// Key must be present in every response (value may still be null).
    pub required: bool,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredSchema {
    /// Name handed to providers that want one (OpenAI `json_schema.name`).
    pub name: String,
    pub properties: Vec<SchemaProperty>,
}

impl StructuredSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), properties: Vec::new() }
    }

    pub fn property(mut self, prop: SchemaProperty) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn required_keys(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Render as a Gemini `generationConfig.responseSchema` value.
    pub fn to_gemini(&self) -> Value {
        let mut props = Map::new();
        for p in &self.properties {
            let mut node = gemini_node(&p.kind);
            node["description"] = json!(p.description);
            if p.nullable {
                node["nullable"] = json!(true);
            }
            props.insert(p.name.clone(), node);
        }
        let ordering: Vec<&str> = self.properties.iter().map(|p| p.name.as_str()).collect();
        json!({
            "type": "OBJECT",
            "properties": props,
            "required": self.required_keys(),
            "propertyOrdering": ordering,
        })
    }

    /// Render as standard JSON Schema (OpenAI `response_format.json_schema.schema`).
    pub fn to_json_schema(&self) -> Value {
        let mut props = Map::new();
        for p in &self.properties {
            let mut node = json_node(&p.kind);
            if p.nullable {
                node["type"] = json!([p.kind.json_type(), "null"]);
            }
            node["description"] = json!(p.description);
            props.insert(p.name.clone(), node);
        }
        json!({
            "type": "object",
            "properties": props,
            "required": self.required_keys(),
            "additionalProperties": false,
        })
    }
}

fn gemini_node(kind: &PropertyKind) -> Value {
    match kind {
        PropertyKind::Array(items) => json!({ "type": "ARRAY", "items": gemini_node(items) }),
        other => json!({ "type": other.gemini_type() }),
    }
}

fn json_node(kind: &PropertyKind) -> Value {
    match kind {
        PropertyKind::Array(items) => json!({ "type": "array", "items": json_node(items) }),
        other => json!({ "type": other.json_type() }),
    }
}

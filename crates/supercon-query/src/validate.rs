//! Parse and validate raw model output into a `SuperconductorRecord`.
//!
//! Policy:
//!   - blank text                       → `EmptyResponse`
//!   - a surrounding markdown fence is stripped before parsing
//!   - not a single JSON object         → `MalformedJson`
//!   - a schema key missing, an empty `name`, or a value of the wrong
//!     JSON type                        → `SchemaMismatch`
//!   - unrecognised classification      → `Classification::Unknown`
//!   - null / blank values              → absent (`None`, empty list, empty description)

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Classification, Field, SuperconductorRecord};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("response is not a single JSON object: {0}")]
    MalformedJson(String),
    #[error("response does not match the schema: {0}")]
    SchemaMismatch(String),
}

type Object = Map<String, Value>;

pub fn parse_and_validate(raw_text: &str) -> Result<SuperconductorRecord, ValidationError> {
    if raw_text.trim().is_empty() {
        return Err(ValidationError::EmptyResponse);
    }

    let body = strip_code_fence(raw_text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ValidationError::MalformedJson(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            )))
        }
    };

    if let Some(missing) = Field::ALL.iter().find(|f| !obj.contains_key(f.key())) {
        return Err(ValidationError::SchemaMismatch(format!(
            "missing required key `{}`",
            missing.key()
        )));
    }

    let name = optional_string(&obj, Field::Name)?.ok_or_else(|| {
        ValidationError::SchemaMismatch("`name` must be a non-empty string".to_string())
    })?;

    Ok(SuperconductorRecord {
        name,
        classification: classification(&obj),
        description: optional_string(&obj, Field::Description)?.unwrap_or_default(),
        critical_temperature_kelvin: optional_number(&obj, Field::CriticalTemperatureKelvin)?,
        critical_temperature_celsius: optional_number(&obj, Field::CriticalTemperatureCelsius)?,
        applications: string_list(&obj, Field::Applications)?,
        crystal_structure: optional_string(&obj, Field::CrystalStructure)?,
        discovered_by: optional_string(&obj, Field::DiscoveredBy)?,
        year_of_discovery: optional_year(&obj, Field::YearOfDiscovery)?,
    })
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and its closing
/// counterpart. Text without a fence comes back trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn mismatch(field: Field, expected: &str, found: &Value) -> ValidationError {
    ValidationError::SchemaMismatch(format!(
        "`{}` must be {expected}, found {}",
        field.key(),
        json_kind(found)
    ))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}

fn optional_string(obj: &Object, field: Field) -> Result<Option<String>, ValidationError> {
    match &obj[field.key()] {
        Value::Null => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        other => Err(mismatch(field, "a string or null", other)),
    }
}

fn optional_number(obj: &Object, field: Field) -> Result<Option<f64>, ValidationError> {
    match &obj[field.key()] {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        other => Err(mismatch(field, "a number or null", other)),
    }
}

fn optional_year(obj: &Object, field: Field) -> Result<Option<i32>, ValidationError> {
    let value = &obj[field.key()];
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let whole = n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            });
            whole
                .and_then(|y| i32::try_from(y).ok())
                .map(Some)
                .ok_or_else(|| mismatch(field, "an integer or null", value))
        }
        other => Err(mismatch(field, "an integer or null", other)),
    }
}

fn string_list(obj: &Object, field: Field) -> Result<Vec<String>, ValidationError> {
    match &obj[field.key()] {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Value::String(_) => {}
                    other => return Err(mismatch(field, "an array of strings", other)),
                }
            }
            Ok(out)
        }
        other => Err(mismatch(field, "an array of strings or null", other)),
    }
}

fn classification(obj: &Object) -> Classification {
    obj[Field::Classification.key()]
        .as_str()
        .map(Classification::from_label)
        .unwrap_or_default()
}

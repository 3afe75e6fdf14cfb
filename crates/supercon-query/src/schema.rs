//! Superconductor record and the response schema.
//!
//! `Field` is the single list of response keys. `describe_schema` builds the
//! outbound structured-output constraint from it and `validate` walks the
//! same list when checking a reply, so the two sides share one definition.

use std::fmt;

use serde::{Deserialize, Serialize};
use supercon_llm::schema::{PropertyKind, SchemaProperty, StructuredSchema};
use tracing::warn;

pub const SCHEMA_NAME: &str = "superconductor";

/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Model-reported Celsius values further than this from the derived value are logged.
const CELSIUS_TOLERANCE: f64 = 0.5;

// ── Classification ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Type I")]
    TypeI,
    #[serde(rename = "Type II")]
    TypeII,
    #[serde(rename = "High-Temperature")]
    HighTemperature,
    #[serde(rename = "Unconventional")]
    Unconventional,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::TypeI,
        Classification::TypeII,
        Classification::HighTemperature,
        Classification::Unconventional,
        Classification::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Classification::TypeI           => "Type I",
            Classification::TypeII          => "Type II",
            Classification::HighTemperature => "High-Temperature",
            Classification::Unconventional  => "Unconventional",
            Classification::Unknown         => "Unknown",
        }
    }

    /// Map a model-supplied label onto a variant. Case, spaces, hyphens and
    /// Roman/Arabic numerals are ignored; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let key: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "typei" | "type1" => Classification::TypeI,
            "typeii" | "type2" => Classification::TypeII,
            "hightemperature" | "hightc" | "hts" | "hightemperaturesuperconductor" => {
                Classification::HighTemperature
            }
            "unconventional" => Classification::Unconventional,
            _ => Classification::Unknown,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Field list ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Classification,
    Description,
    CriticalTemperatureKelvin,
    CriticalTemperatureCelsius,
    Applications,
    CrystalStructure,
    DiscoveredBy,
    YearOfDiscovery,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Classification,
        Field::Description,
        Field::CriticalTemperatureKelvin,
        Field::CriticalTemperatureCelsius,
        Field::Applications,
        Field::CrystalStructure,
        Field::DiscoveredBy,
        Field::YearOfDiscovery,
    ];

    /// JSON key on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Field::Name                       => "name",
            Field::Classification             => "type",
            Field::Description                => "description",
            Field::CriticalTemperatureKelvin  => "criticalTemperatureKelvin",
            Field::CriticalTemperatureCelsius => "criticalTemperatureCelsius",
            Field::Applications               => "applications",
            Field::CrystalStructure           => "crystalStructure",
            Field::DiscoveredBy               => "discoveredBy",
            Field::YearOfDiscovery            => "yearOfDiscovery",
        }
    }

    pub fn kind(self) -> PropertyKind {
        match self {
            Field::CriticalTemperatureKelvin | Field::CriticalTemperatureCelsius => PropertyKind::Number,
            Field::YearOfDiscovery => PropertyKind::Integer,
            Field::Applications => PropertyKind::Array(Box::new(PropertyKind::String)),
            _ => PropertyKind::String,
        }
    }

    /// Every value may be null except the material name.
    pub fn nullable(self) -> bool {
        self != Field::Name
    }

    pub fn description(self) -> &'static str {
        match self {
            Field::Name => "The common name of the superconductor.",
            Field::Classification => {
                "The classification of the superconductor: one of 'Type I', 'Type II', \
                 'High-Temperature', 'Unconventional' or 'Unknown'."
            }
            Field::Description => {
                "A detailed description of the superconductor, its properties, and significance."
            }
            Field::CriticalTemperatureKelvin => {
                "The critical temperature (Tc) in Kelvin. Use null if not widely agreed upon or known."
            }
            Field::CriticalTemperatureCelsius => {
                "The critical temperature (Tc) in Celsius. Use null if not widely agreed upon or known."
            }
            Field::Applications => "A list of key applications or potential uses.",
            Field::CrystalStructure => {
                "The crystal structure of the material (e.g., 'Perovskite', 'Hexagonal'). \
                 Use null if not applicable or known."
            }
            Field::DiscoveredBy => {
                "The person or group credited with its discovery. Use null if not known."
            }
            Field::YearOfDiscovery => "The year of its discovery. Use null if not known.",
        }
    }
}

/// Structured-output constraint sent with every query: all nine keys
/// required, values nullable except `name`.
pub fn describe_schema() -> StructuredSchema {
    Field::ALL.iter().fold(StructuredSchema::new(SCHEMA_NAME), |schema, f| {
        schema.property(SchemaProperty {
            name: f.key().to_string(),
            kind: f.kind(),
            description: f.description().to_string(),
            required: true,
            nullable: f.nullable(),
        })
    })
}

// ── Record ───────────────────────────────────────────────────────────────────

/// A validated superconductor description. Only `validate::parse_and_validate`
/// produces these from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperconductorRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub classification: Classification,
    pub description: String,
    pub critical_temperature_kelvin: Option<f64>,
    pub critical_temperature_celsius: Option<f64>,
    pub applications: Vec<String>,
    pub crystal_structure: Option<String>,
    pub discovered_by: Option<String>,
    pub year_of_discovery: Option<i32>,
}

impl SuperconductorRecord {
    /// Make the two Tc values agree. Kelvin wins when present; Celsius is
    /// recomputed from it. A Celsius-only reply gets its Kelvin derived.
    pub fn normalize_temperatures(&mut self) {
        match (self.critical_temperature_kelvin, self.critical_temperature_celsius) {
            (Some(k), reported) => {
                let derived = round2(k - KELVIN_OFFSET);
                if let Some(c) = reported {
                    if (c - derived).abs() > CELSIUS_TOLERANCE {
                        warn!(
                            material = %self.name,
                            kelvin = k,
                            reported_celsius = c,
                            derived_celsius = derived,
                            "Model Celsius value disagrees with Kelvin; using derived value"
                        );
                    }
                }
                self.critical_temperature_celsius = Some(derived);
            }
            (None, Some(c)) => {
                self.critical_temperature_kelvin = Some(round2(c + KELVIN_OFFSET));
            }
            (None, None) => {}
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

//! Example materials offered on an empty session.

use serde::Serialize;

pub const FEATURED_LABELS: [&str; 4] = [
    "YBa₂Cu₃O₇ (YBCO)",
    "Niobium-tin (Nb₃Sn)",
    "MgB₂",
    "Iron pnictides",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturedMaterial {
    pub label: &'static str,
    /// Text actually submitted when the example is picked.
    pub material: String,
}

/// The part of a label before any parenthesised alias, trimmed.
pub fn material_from_label(label: &str) -> &str {
    label.split('(').next().unwrap_or(label).trim()
}

pub fn featured_materials() -> Vec<FeaturedMaterial> {
    FEATURED_LABELS
        .iter()
        .map(|&label| FeaturedMaterial {
            label,
            material: material_from_label(label).to_string(),
        })
        .collect()
}

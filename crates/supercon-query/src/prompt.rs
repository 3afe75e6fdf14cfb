//! Prompt text for a material lookup.

use crate::schema::Field;

/// Sent as the system turn of every lookup.
pub const SYSTEM_INSTRUCTION: &str = "You are a materials-science reference. \
    Answer only with factual, widely accepted data about superconductors, \
    and reply with a single JSON object.";

/// Build the instruction sent to the model for `material_name`.
/// Quotes in the name are escaped so the material stays one quoted token.
pub fn build_prompt(material_name: &str) -> String {
    let name = material_name.trim().replace('"', "\\\"");
    let keys = Field::ALL
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analyze the superconductor named \"{name}\".\n\
         Classify it as Type I, Type II, High-Temperature, Unconventional or Unknown, \
         and give a detailed description of its properties and significance.\n\
         Give its critical temperature in both Kelvin and Celsius, list its key applications, \
         and state its crystal structure, who discovered it and the year of discovery.\n\
         If any piece of information is not available or widely known, use null for that field.\n\
         Your response must be a single, valid JSON object with exactly these keys: {keys}. \
         It must strictly adhere to the provided schema. \
         Do not include any markdown formatting like ```json."
    )
}

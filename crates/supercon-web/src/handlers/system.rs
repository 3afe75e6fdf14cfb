//! Featured examples and service status.

use axum::{extract::State, Json};
use serde::Serialize;
use supercon_query::featured::{featured_materials, FeaturedMaterial};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub model: String,
    pub credential_configured: bool,
}

/// GET /api/examples
pub async fn examples() -> Json<Vec<FeaturedMaterial>> {
    Json(featured_materials())
}

/// GET /api/health
pub async fn health(State(state): State<SharedState>) -> Json<Health> {
    let service = &state.service;
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: service.provider_name().to_string(),
        model: service.model_id().to_string(),
        credential_configured: service.has_credential(),
    })
}

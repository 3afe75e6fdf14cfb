//! Query Service - one structured-output model call per material lookup.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use supercon_llm::audit::LlmAuditEntry;
use supercon_llm::{LlmBackend, LlmError, LlmRequest};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::prompt::{build_prompt, SYSTEM_INSTRUCTION};
use crate::schema::{describe_schema, SuperconductorRecord};
use crate::validate::parse_and_validate;

/// Errors visible at the service boundary. Everything internal (transport,
/// provider status, validation) is folded into one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("material name must not be empty")]
    InvalidInput,
    #[error("{0}")]
    AuthError(String),
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },
    #[error("{provider} request failed: {detail}")]
    ServiceError { provider: String, detail: String },
}

impl QueryError {
    /// Message safe to show an end user. Diagnostics stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::InvalidInput => "Please enter the name of a superconductor.".to_string(),
            QueryError::AuthError(msg) => msg.clone(),
            QueryError::EmptyResponse { provider } | QueryError::ServiceError { provider, .. } => {
                service_failure_message(provider)
            }
        }
    }
}

pub fn service_failure_message(provider: &str) -> String {
    format!(
        "Failed to fetch data from the {provider} API. The material may not be recognized \
         or there could be an issue with the service."
    )
}

/// Settings injected at construction. The credential lives here and nowhere else.
#[derive(Debug, Default)]
pub struct QueryConfig {
    pub api_key: Option<SecretString>,
    /// Overrides the backend's default model when set.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Output token ceiling; the backend default applies when unset.
    pub max_output_tokens: Option<u32>,
    /// Recompute Celsius from Kelvin (or the reverse) after validation.
    pub normalize_temperatures: bool,
}

pub struct QueryService {
    backend: Arc<dyn LlmBackend>,
    config: QueryConfig,
}

impl QueryService {
    pub fn new(config: QueryConfig, backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend, config }
    }

    pub fn provider_name(&self) -> &str {
        self.backend.provider_name()
    }

    pub fn model_id(&self) -> &str {
        self.config.model.as_deref().unwrap_or_else(|| self.backend.model_id())
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Look up one material. Exactly one backend call on the happy path,
    /// none when the input is blank or no credential is configured.
    #[instrument(skip(self), fields(provider = %self.provider_name(), model = %self.model_id()))]
    pub async fn fetch_material_info(
        &self,
        material_name: &str,
    ) -> Result<SuperconductorRecord, QueryError> {
        let name = material_name.trim();
        if name.is_empty() {
            return Err(QueryError::InvalidInput);
        }

        let provider = self.provider_name().to_string();
        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            warn!("Query rejected: no API key configured");
            QueryError::AuthError(format!("{provider} API key is not configured."))
        })?;

        let mut req = LlmRequest::new(build_prompt(name))
            .with_system(SYSTEM_INSTRUCTION)
            .with_schema(describe_schema());
        if let Some(model) = &self.config.model {
            req = req.with_model(model.clone());
        }
        if let Some(t) = self.config.temperature {
            req = req.with_temperature(t);
        }
        if let Some(n) = self.config.max_output_tokens {
            req = req.with_max_tokens(n);
        }

        let started = Instant::now();
        let resp = self.backend.generate(api_key, req).await.map_err(|e| {
            error!(error = %e, timeout = e.is_timeout(), "LLM call failed");
            classify_backend_error(&provider, e)
        })?;
        LlmAuditEntry::new(&provider, &resp, elapsed_ms(started.elapsed())).emit();

        let text = match resp.text {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                warn!("Model returned no text");
                return Err(QueryError::EmptyResponse { provider });
            }
        };

        let mut record = parse_and_validate(&text).map_err(|e| {
            warn!(error = %e, raw = %text, "Model reply failed validation");
            QueryError::ServiceError { provider: provider.clone(), detail: e.to_string() }
        })?;
        if self.config.normalize_temperatures {
            record.normalize_temperatures();
        }

        info!(
            material = %record.name,
            classification = %record.classification,
            "Material lookup succeeded"
        );
        Ok(record)
    }
}

/// Milliseconds, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// A rejected key is a credential problem; every other failure is the service's.
fn classify_backend_error(provider: &str, e: LlmError) -> QueryError {
    match e {
        LlmError::ApiError { status: 401 | 403, .. } => QueryError::AuthError(format!(
            "The {provider} API rejected the configured API key."
        )),
        other => QueryError::ServiceError {
            provider: provider.to_string(),
            detail: other.to_string(),
        },
    }
}

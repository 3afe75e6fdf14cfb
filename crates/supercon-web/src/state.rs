//! Shared application state for the web server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use supercon_llm::backend::{GeminiBackend, OpenAiCompatibleBackend, OPENAI_BASE_URL};
use supercon_llm::LlmBackend;
use supercon_query::{run_query, QueryConfig, QueryService, QuerySession, SessionSnapshot};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, LlmProvider};
use crate::error::ApiError;

/// Events pushed to connected clients via SSE.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A session changed state (query started, finished, or cleared).
    SessionUpdated { session_id: Uuid, snapshot: SessionSnapshot },
    /// The session was removed; no further events follow for it.
    SessionClosed { session_id: Uuid },
}

impl AppEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            AppEvent::SessionUpdated { session_id, .. }
            | AppEvent::SessionClosed { session_id } => *session_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::SessionUpdated { .. } => "session",
            AppEvent::SessionClosed { .. } => "closed",
        }
    }
}

type SessionHandle = Arc<Mutex<QuerySession>>;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub service: QueryService,
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    /// Broadcast channel for SSE push events
    pub event_tx: broadcast::Sender<AppEvent>,
}

impl AppState {
    pub fn new(service: QueryService) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { service, sessions: Mutex::new(HashMap::new()), event_tx }
    }

    /// Build the backend and query service described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm = &config.llm;
        let timeout = Duration::from_secs(llm.timeout_secs);

        let backend: Arc<dyn LlmBackend> = match llm.provider {
            LlmProvider::Gemini => {
                let mut b = GeminiBackend::new(llm.model.clone(), timeout)?;
                if let Some(url) = &llm.base_url {
                    b = b.with_base_url(url.clone());
                }
                Arc::new(b)
            }
            LlmProvider::OpenaiCompatible => Arc::new(OpenAiCompatibleBackend::new(
                llm.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                llm.model.clone(),
                timeout,
            )?),
        };

        let api_key = llm.resolve_api_key();
        if api_key.is_none() {
            warn!(
                "No {} API key found (set llm.api_key or SUPERCON_API_KEY); lookups will fail until one is configured",
                backend.provider_name()
            );
        }
        info!(provider = backend.provider_name(), model = backend.model_id(), "LLM backend ready");

        let service = QueryService::new(
            QueryConfig {
                api_key,
                model: None,
                temperature: llm.temperature,
                max_output_tokens: llm.max_output_tokens,
                normalize_temperatures: config.query.normalize_temperatures,
            },
            backend,
        );
        Ok(Self::new(service))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    pub fn create_session(&self) -> (Uuid, SessionSnapshot) {
        let id = Uuid::new_v4();
        let session = QuerySession::new();
        let snapshot = session.snapshot();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(session)));
        info!(session_id = %id, "Session created");
        (id, snapshot)
    }

    fn session(&self, id: Uuid) -> Result<SessionHandle, ApiError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(ApiError::SessionNotFound(id))
    }

    pub fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, ApiError> {
        let handle = self.session(id)?;
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.snapshot())
    }

    /// Run one lookup for the session and return its state afterwards.
    pub async fn start_query(&self, id: Uuid, material: &str) -> Result<SessionSnapshot, ApiError> {
        let handle = self.session(id)?;
        let applied = run_query(&handle, &self.service, material, |s| self.publish(id, s)).await?;
        if !applied {
            info!(session_id = %id, "Query outcome superseded before it arrived");
        }
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.snapshot())
    }

    pub fn clear(&self, id: Uuid) -> Result<SessionSnapshot, ApiError> {
        let handle = self.session(id)?;
        let mut session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        session.clear();
        self.publish(id, &session);
        Ok(session.snapshot())
    }

    /// Drop the session from the registry. A query still in flight for it
    /// resolves against a cleared session and is discarded.
    pub fn close_session(&self, id: Uuid) -> Result<(), ApiError> {
        let handle = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(ApiError::SessionNotFound(id))?;
        handle.lock().unwrap_or_else(PoisonError::into_inner).clear();

        let _ = self.event_tx.send(AppEvent::SessionClosed { session_id: id });
        info!(session_id = %id, remaining = self.session_count(), "Session closed");
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn publish(&self, session_id: Uuid, session: &QuerySession) {
        // no subscribers is not an error
        let _ = self.event_tx.send(AppEvent::SessionUpdated {
            session_id,
            snapshot: session.snapshot(),
        });
    }
}

pub type SharedState = Arc<AppState>;

//! Per-session query state.
//!
//! A session is an explicit state value rather than a set of flags:
//!
//!   Idle ──begin──▶ Requesting ──resolve──▶ Succeeded(record) | Failed(message)
//!    ▲                  │                          │
//!    └──────clear───────┴──────────clear───────────┘
//!
//! Every `begin` and `clear` issues a new request token. `resolve` only
//! applies an outcome whose token is still the latest, so a response that
//! arrives after the user cleared the session is dropped.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::schema::SuperconductorRecord;
use crate::service::{QueryError, QueryService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    fn next(self) -> Self {
        RequestToken(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    Requesting,
    Succeeded(SuperconductorRecord),
    Failed(String),
}

impl QueryState {
    pub fn name(&self) -> &'static str {
        match self {
            QueryState::Idle         => "idle",
            QueryState::Requesting   => "requesting",
            QueryState::Succeeded(_) => "succeeded",
            QueryState::Failed(_)    => "failed",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("material name must not be empty")]
    EmptyInput,
    #[error("a query is already in progress for this session")]
    AlreadyRequesting,
}

/// Serializable view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: &'static str,
    pub input: String,
    pub is_loading: bool,
    pub result: Option<SuperconductorRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct QuerySession {
    input: String,
    state: QueryState,
    latest: RequestToken,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query. Drops any previous outcome so nothing stale is shown
    /// while the request is in flight.
    pub fn begin(&mut self, input: &str) -> Result<RequestToken, SessionError> {
        if self.is_loading() {
            return Err(SessionError::AlreadyRequesting);
        }
        let name = input.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.input = name.to_string();
        self.latest = self.latest.next();
        self.state = QueryState::Requesting;
        Ok(self.latest)
    }

    /// Apply the outcome of the request identified by `token`. Returns
    /// false (and changes nothing) when the token has been superseded.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        outcome: Result<SuperconductorRecord, QueryError>,
    ) -> bool {
        if token != self.latest || !self.is_loading() {
            debug!(?token, latest = ?self.latest, "Discarding superseded query outcome");
            return false;
        }
        self.state = match outcome {
            Ok(record) => QueryState::Succeeded(record),
            Err(e) => QueryState::Failed(e.user_message()),
        };
        true
    }

    pub fn clear(&mut self) {
        self.latest = self.latest.next();
        self.state = QueryState::Idle;
        self.input.clear();
    }

    pub fn state(&self) -> &QueryState { &self.state }
    pub fn input(&self) -> &str { &self.input }
    pub fn is_loading(&self) -> bool { self.state == QueryState::Requesting }

    pub fn current_result(&self) -> Option<&SuperconductorRecord> {
        match &self.state {
            QueryState::Succeeded(record) => Some(record),
            _ => None,
        }
    }

    pub fn current_error(&self) -> Option<&str> {
        match &self.state {
            QueryState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.name(),
            input: self.input.clone(),
            is_loading: self.is_loading(),
            result: self.current_result().cloned(),
            error: self.current_error().map(String::from),
        }
    }
}

/// Drive one query against a shared session: begin under the lock, call
/// the service with the lock released, then resolve under the lock again.
/// `on_change` sees the session after each transition it caused.
/// Returns whether the outcome was applied.
pub async fn run_query<F>(
    session: &Mutex<QuerySession>,
    service: &QueryService,
    input: &str,
    on_change: F,
) -> Result<bool, SessionError>
where
    F: Fn(&QuerySession),
{
    let token = {
        let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        let token = guard.begin(input)?;
        on_change(&guard);
        token
    };

    let outcome = service.fetch_material_info(input).await;

    let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
    let applied = guard.resolve(token, outcome);
    if applied {
        on_change(&guard);
    }
    Ok(applied)
}

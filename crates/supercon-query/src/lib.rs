//! supercon-query - material lookup pipeline.
//! Turns a free-text material name into a validated `SuperconductorRecord`
//! (or a classified error) through one structured-output LLM call.
//!
//!   schema   - record type, classification, and the shared field list
//!   validate - parse_and_validate for raw model output
//!   prompt   - instruction text for a lookup
//!   service  - QueryService::fetch_material_info
//!   session  - per-session state machine with request tokens
//!   featured - example materials

pub mod schema;
pub mod validate;
pub mod prompt;
pub mod service;
pub mod session;
pub mod featured;

pub use schema::{describe_schema, Classification, Field, SuperconductorRecord};
pub use service::{QueryConfig, QueryError, QueryService};
pub use session::{run_query, QuerySession, QueryState, SessionError, SessionSnapshot};
pub use validate::{parse_and_validate, ValidationError};

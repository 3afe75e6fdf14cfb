//! supercon-llm - structured-output LLM backend abstraction.
//! Implements the LlmBackend trait, the provider backends, and the
//! declarative response schema handed to them.

pub mod backend;
pub mod schema;
pub mod audit;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};
pub use schema::{PropertyKind, SchemaProperty, StructuredSchema};

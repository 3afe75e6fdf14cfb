//! supercon-web - HTTP boundary for the superconductor lookup service.
//! Provides:
//!   - Per-client query sessions (start a lookup, read state, clear)
//!   - SSE stream of session state changes
//!   - Featured example materials
//!   - Service status

pub mod config;
pub mod error;
pub mod router;
pub mod handlers;
pub mod state;
pub mod sse;

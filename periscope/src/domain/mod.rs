//! Domain model for the probe
//!
//! This module contains core domain types and errors that provide:
//! - Stable identities for instrumented functions (binding keys)
//! - Structured, per-trace error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{BindingKey, ResolvedTrace, TraceDirective};

pub use errors::{BindingFailure, MultiTraceError, ReassignError, TraceError};

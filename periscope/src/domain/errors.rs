//! Structured error types for the probe
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::types::BindingKey;

/// Per-trace failure: everything that can go wrong while turning one
/// desired trace into injected code. Always recovered locally and reported
/// upstream; never unwinds a reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("Unterminated placeholder: unmatched `{{` at byte {at}")]
    UnterminatedPlaceholder { at: usize },

    #[error("Placeholder `{name}` is not a parameter of the target function (parameters: {params:?})")]
    InvalidPlaceholder { name: String, params: Vec<String> },

    #[error("Malformed function path `{path}` (expected `<module>:<function>`)")]
    Path { path: String },

    #[error("Cannot resolve module `{module}` (package context `{package}`)")]
    ModuleResolution { module: String, package: String },

    #[error("Cannot resolve function `{function}` in module `{module}`")]
    FunctionResolution { module: String, function: String },

    #[error("Line {line} is outside function `{function}` (lines {first}..={last})")]
    LineOutOfRange { line: u32, function: String, first: u32, last: u32 },

    #[error("Internal fault: {0}")]
    Internal(String),
}

/// Attempted revert of a function that was never assigned through the
/// reassigner. Indicates an engine bug, not a bad trace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassignError {
    #[error("Function {0} has no recorded original body")]
    Unassigned(BindingKey),
}

/// One binding's failure within a reconciliation, attributed to a specific
/// trace when one is identifiable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFailure {
    pub trace_id: Option<String>,
    pub error: TraceError,
}

impl BindingFailure {
    #[must_use]
    pub fn new(trace_id: Option<String>, error: TraceError) -> Self {
        BindingFailure { trace_id, error }
    }
}

impl fmt::Display for BindingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.trace_id {
            Some(id) => write!(f, "trace {id}: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Aggregate result of a reconciliation with at least one failed binding.
///
/// Maps each failed `(module, function)` key to its first recorded failure;
/// bindings absent from the map were applied successfully.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiTraceError {
    errors: BTreeMap<BindingKey, BindingFailure>,
}

impl MultiTraceError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `key`. The first failure per binding wins;
    /// later ones for the same key are dropped.
    pub fn record(&mut self, key: BindingKey, failure: BindingFailure) {
        self.errors.entry(key).or_insert(failure);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn get(&self, key: &BindingKey) -> Option<&BindingFailure> {
        self.errors.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingKey, &BindingFailure)> {
        self.errors.iter()
    }

    /// `Ok(())` when no binding failed, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), MultiTraceError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiTraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} binding(s) failed", self.errors.len())?;
        for (key, failure) in &self.errors {
            write!(f, "; {key}: {failure}")?;
        }
        Ok(())
    }
}

//! Code-body synthesis: turning trace directives into an injected body.
//!
//! Synthesis never mutates anything live. It validates every directive,
//! clones the original statement tree, inserts one guarded emit per
//! directive, and recompiles the result into a fresh immutable body the
//! engine can later swap in (or throw away if a sibling binding fails).

use periscope_script::ast::{Block, EmitSegment, Stmt, StmtKind};
use periscope_script::compile::{self, CodeBody};
use periscope_script::host::ScriptFunction;
use thiserror::Error;

use crate::domain::{TraceDirective, TraceError};
use crate::inject::injector::insert_stmt;
use crate::inject::segments::{parse_segments, sections};

/// Why a binding's synthesis failed.
#[derive(Error, Debug)]
pub enum SynthesisFault {
    /// Attributable to one directive; reported upstream per trace.
    #[error("trace {trace_id}: {error}")]
    Trace { trace_id: String, error: TraceError },

    /// Tree surgery or recompilation failed. This is an engine defect, not
    /// bad operator input.
    #[error("Synthesis fault: {0}")]
    Internal(String),
}

/// Builds the guarded emit statement for one directive, validating its
/// placeholders against the target function's parameters.
fn build_guard(directive: &TraceDirective, params: &[String]) -> Result<Stmt, SynthesisFault> {
    let fault = |error: TraceError| SynthesisFault::Trace {
        trace_id: directive.trace_id.clone(),
        error,
    };

    let segments = parse_segments(&directive.statement).map_err(fault)?;
    let mut parts = Vec::new();
    for (is_placeholder, text) in sections(&directive.statement, &segments) {
        if is_placeholder {
            if !params.iter().any(|param| param == text) {
                return Err(fault(TraceError::InvalidPlaceholder {
                    name: text.to_string(),
                    params: params.to_vec(),
                }));
            }
            parts.push(EmitSegment::Placeholder(text.to_string()));
        } else {
            parts.push(EmitSegment::Literal(text.replace("\\{", "{").replace("\\}", "}")));
        }
    }

    let emit = Stmt {
        line: directive.line,
        kind: StmtKind::Emit { trace_id: directive.trace_id.clone(), segments: parts },
    };
    Ok(Stmt {
        line: directive.line,
        kind: StmtKind::Guard {
            trace_id: directive.trace_id.clone(),
            body: Block { stmts: vec![emit] },
        },
    })
}

/// Produces a new code body for `func` with every directive's guarded emit
/// injected into `original`.
///
/// `directives` must be ordered by ascending line, then by arrival order
/// for ties. Insertion walks that list in reverse: each statement lands
/// before anything previously inserted at the same point, which is exactly
/// what makes same-line traces execute in submission order.
pub fn synthesize(
    func: &ScriptFunction,
    original: &CodeBody,
    directives: &[TraceDirective],
) -> Result<CodeBody, SynthesisFault> {
    let params = original.params();
    let mut guards = Vec::with_capacity(directives.len());
    for directive in directives {
        guards.push((directive, build_guard(directive, params)?));
    }

    let mut body = original.block().as_ref().clone();
    for (directive, guard) in guards.iter().rev() {
        if !insert_stmt(func.start_line(), &mut body, directive.line, guard) {
            return Err(SynthesisFault::Trace {
                trace_id: directive.trace_id.clone(),
                error: TraceError::LineOutOfRange {
                    line: directive.line,
                    function: func.qualified_name().to_string(),
                    first: func.start_line(),
                    last: func.end_line(),
                },
            });
        }
    }

    compile::compile(func.qualified_name(), params, &body)
        .map_err(|err| SynthesisFault::Internal(err.to_string()))
}

//! # Periscope Script - Embedded Scripting Runtime with Hot-Swappable Bodies
//!
//! A deliberately small imperative language whose compiled function bodies
//! live behind atomic cells. That one property is what the rest of Periscope
//! builds on: a running function can have its body replaced with a rewritten
//! copy (extra statements injected, or the original restored) without pausing
//! callers, locking the world, or reloading the module.
//!
//! ## Pipeline
//!
//! ```text
//! source (.psc) ──▶ lex ──▶ parse ──▶ compile ──▶ CodeBody (Arc)
//!                                                    │
//!                                    ScriptFunction::swap_code()
//!                                                    ▼
//!                                          ArcSwap cell ──▶ eval
//! ```
//!
//! ## Module Structure
//!
//! - [`lex`]: Token stream with 1-based line numbers
//! - [`parse`]: Recursive-descent parser producing [`ast::Module`]
//! - [`ast`]: Syntax tree; statements carry their source line, which live
//!   injection keys on
//! - [`compile`]: Slot allocation and name checking; produces the immutable
//!   [`compile::CodeBody`]
//! - [`host`]: [`host::ScriptHost`] registry, per-function
//!   [`host::ScriptFunction`] cells, and the [`host::EmitHook`] output seam
//! - [`value`]: Runtime [`value::Value`] and operator semantics
//! - [`error`]: Parse, compile, load, and runtime error types
//!
//! ## Key Properties
//!
//! - **Swap is atomic**: calls already executing finish on the body they
//!   loaded; the next call observes the new body.
//! - **Frames are flat**: every parameter and `let` in a function gets one
//!   slot, so an injected statement can reference any local by name.
//! - **Guards contain failures**: [`ast::StmtKind::Guard`] converts a runtime
//!   error in its body into an `EmitHook::error` report and resumes the
//!   surrounding function.

pub mod ast;
pub mod compile;
pub mod error;
mod eval;
pub mod host;
pub mod lex;
pub mod parse;
pub mod value;

//! # Periscope - Live Log Injection for Running Scripts
//!
//! Periscope lets an operator add, change, and remove log statements in a
//! running script host without restarting it. A control plane holds the
//! desired set of trace statements; this crate owns making the running
//! process match it, one reconciliation at a time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Control Plane                            │
//! │        (desired trace set, script browser, log viewer)          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ newline-delimited JSON over TCP
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Periscope (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │    Agent     │──▶│    Engine    │──▶│    Inject    │        │
//! │  │  (session)   │   │ (reconcile)  │   │ (synthesize) │        │
//! │  └──────┬───────┘   └──────────────┘   └──────┬───────┘        │
//! │         │                                     │ swap body      │
//! │         │           ┌──────────────┐          ▼                │
//! │         └──────────▶│    Sinks     │   ┌──────────────┐        │
//! │           log lines │  (fan-out)   │◀──│ Script Host  │        │
//! │                     └──────────────┘   │ (periscope-  │        │
//! │                                        │   script)    │        │
//! │                                        └──────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`engine`]: Desired-state reconciliation
//!   - Diffs the incoming trace set against the active one by trace id
//!   - Groups work per `(module, function)` binding and isolates failures
//!   - Synthesizes every replacement body before mutating anything
//!
//! - [`inject`]: Statement synthesis and code swapping
//!   - `segments`: placeholder parsing for trace statement templates
//!   - `injector`: line-targeted statement insertion into a function body
//!   - `synth`: template → guarded emit statement → recompiled body
//!   - `reassign`: original-body bookkeeping and revert
//!
//! - [`resolve`]: `<module>:<function>` paths to live script functions,
//!   with relative-path absolutization and lookup caching
//!
//! - [`agent`]: Control-plane session on a dedicated runtime thread
//!   - Reconnect loop with capped exponential backoff
//!   - Hello + inventory preamble, heartbeats, log shipping
//!   - Every received desired set is a wholesale replacement
//!
//! ### Support Modules
//!
//! - [`sink`]: Fan-out of emitted log lines and trace errors to
//!   registered consumers (stdout, channel to the agent)
//!
//! - [`inventory`]: Script tree walk producing hashed, summarized file
//!   records for upload
//!
//! - [`module_map`]: Control-plane file names to loaded module paths
//!
//! - [`config`]: Probe settings and preflight validation
//!
//! - [`cli`]: Command-line argument parsing
//!
//! - [`domain`]: Core types (`BindingKey`, `ResolvedTrace`, error shapes)
//!
//! ## Reconciliation Guarantees
//!
//! - **Wholesale replacement**: each desired set fully describes the
//!   target state; anything active and absent from it is retracted.
//! - **Synthesis before mutation**: a binding whose new body fails to
//!   build keeps running its previous body, and its previously active
//!   traces stay accounted for.
//! - **Failure isolation**: errors are recorded per `(module, function)`
//!   binding; healthy bindings commit regardless.
//! - **Guaranteed teardown**: dropping the probe or the agent handle
//!   reverts every mutated function to its original body.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Run a script once with stdout trace output
//! periscope --scripts ./scripts --entry 'fib:main' --arg 25
//!
//! # Keep the entry loop running under control-plane management
//! periscope --scripts ./scripts --entry 'fib:main' --arg 25 \
//!           --loop-ms 500 --endpoint 127.0.0.1:9000 --package fib
//! ```
//!
//! ## Key Concepts
//!
//! - **Trace**: one log statement, identified by the control plane,
//!   attached to a line of a named function
//! - **Binding**: the `(module, function)` a group of traces lands on;
//!   the unit of synthesis, failure, and revert
//! - **Desired set**: the complete collection of traces that should be
//!   live, replacing whatever came before
//! - **Original body**: a function's code as first seen, recorded before
//!   its first mutation and restored on revert

// Expose modules for testing
pub mod agent;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod inject;
pub mod inventory;
pub mod module_map;
pub mod resolve;
pub mod sink;

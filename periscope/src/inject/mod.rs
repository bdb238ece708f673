//! Code injection subsystem
//!
//! Everything between a trace directive and a swapped-in function body:
//!
//! - [`segments`]: placeholder scanning of statement text
//! - [`injector`]: line-addressed insertion into the statement tree
//! - [`synth`]: validation, guard construction, and recompilation
//! - [`reassign`]: original-body bookkeeping so every mutation reverses
//!
//! Synthesis is pure (it builds a candidate body without touching the live
//! one); only [`reassign::Reassigner::assign`] mutates a dispatch cell.

pub mod injector;
pub mod reassign;
pub mod segments;
pub mod synth;

pub use reassign::Reassigner;
pub use synth::{synthesize, SynthesisFault};

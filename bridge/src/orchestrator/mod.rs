//! Orchestrator - host-loop driver
//!
//! Implements the start / step / finish hooks around one federate.
//!
//! See `engine.rs` for full implementation.

pub mod engine;

// Re-export main types for convenience
pub use engine::{Orchestrator, StepResult};

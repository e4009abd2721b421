//! NetPilot agent: library crate for the query-to-execution pipeline.
//!
//! Re-exports all modules so the binaries (`netpilot`, `np-api`) and
//! external crates (e.g. `np-e2e-tests`) can reach `Pipeline`,
//! `CommandPlanner`, `CommandExecutor` and the LLM backends.

pub mod config;
pub mod executor;
pub mod inference;
pub mod logging;
pub mod pipeline;
pub mod planner;
pub mod render;

pub use executor::CommandExecutor;
pub use pipeline::Pipeline;
pub use planner::CommandPlanner;

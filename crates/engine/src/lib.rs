//! # Taskforge Engine
//!
//! The three-stage pipeline that turns a free-text objective into executed
//! tasks:
//!
//! 1. **Generate**: prompt the backend to break the objective into tasks
//! 2. **Prioritize**: stable-sort the list so critical work runs first
//! 3. **Execute**: run tasks one at a time, storing each result
//!
//! The pipeline is built to finish: model output that fails to parse
//! degrades through fallback tiers (JSON, then numbered lines, then a fixed
//! default sequence), a failed breakdown call substitutes the default list,
//! and a failed execution call substitutes a placeholder result. Once a run
//! starts, it completes.

pub mod executor;
pub mod generator;
pub mod orchestrator;
pub mod parse;
pub mod prompt;

pub use executor::{ExecutionOutcome, SIMULATED_RESULT, TaskExecutor};
pub use generator::{GeneratedTasks, TaskGenerator, default_task_list};
pub use orchestrator::Orchestrator;
pub use parse::{ParseSource, ParsedBreakdown, TaskDraft, parse_task_breakdown};

#[cfg(test)]
pub(crate) mod test_helpers;

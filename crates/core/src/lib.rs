//! # Taskforge Core
//!
//! Domain types, traits, and error definitions for the taskforge pipeline:
//! tasks, runs, generation requests, and the events a run emits.
//!
//! The only abstraction here is [`TextGenerator`] — backends implement it in
//! their own crate, the engine drives it, and tests swap in scripted fakes.
//! Everything else depends inward on this crate, never sideways.

pub mod error;
pub mod event;
pub mod generation;
pub mod run;
pub mod task;

// Root re-exports so callers rarely need the module paths
pub use error::{Error, GenerationError, Result};
pub use event::{EventBus, PipelineEvent};
pub use generation::{Generation, GenerationOptions, GenerationRequest, TextGenerator, Usage};
pub use run::{ExecutionLogEntry, LogLevel, Run, RunId, RunState};
pub use task::{Task, TaskId, TaskPriority, TaskStatus};

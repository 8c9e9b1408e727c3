//! Run domain types — one objective's journey through the pipeline.
//!
//! A `Run` is transient: created when an objective arrives, mutated in place
//! as tasks are generated and executed, and handed back to the caller when
//! the pipeline finishes. Nothing here persists across invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Task, TaskStatus};

/// Unique identifier for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line in a run's append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,

    /// Severity tag
    pub level: LogLevel,

    /// Free-text message
    pub message: String,
}

impl ExecutionLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Where a run currently is in the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Accepted, nothing started yet
    #[default]
    Idle,
    /// Waiting on the breakdown generation call
    GeneratingTasks,
    /// Sorting the generated tasks by priority
    Prioritizing,
    /// Executing the task at this index in the sorted list
    ExecutingTask(usize),
    /// Every task was executed; terminal
    Completed,
    /// The run stopped before executing tasks; terminal
    Failed,
}

impl RunState {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The transient state of one objective moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run ID
    pub id: RunId,

    /// The objective text this run breaks down
    pub objective: String,

    /// Generated tasks, in execution order once prioritized
    pub tasks: Vec<Task>,

    /// Append-only execution log
    pub log: Vec<ExecutionLogEntry>,

    /// Current pipeline state
    pub state: RunState,

    /// Sticky error message; set when a stage degraded or the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create an idle run for an objective.
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            objective: objective.into(),
            tasks: Vec::new(),
            log: Vec::new(),
            state: RunState::Idle,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append an entry to the execution log.
    pub fn record(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log.push(ExecutionLogEntry::new(level, message));
    }

    /// Move the run into a new pipeline state.
    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    /// Mark the run completed.
    pub fn finish_completed(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the run failed with a reason.
    pub fn finish_failed(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Whether the run has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Number of tasks that reached completed (simulated results included).
    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_is_idle_and_empty() {
        let run = Run::new("Plan a trip");
        assert_eq!(run.state, RunState::Idle);
        assert!(run.tasks.is_empty());
        assert!(run.log.is_empty());
        assert!(run.error.is_none());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn record_appends_in_order() {
        let mut run = Run::new("test");
        run.record(LogLevel::Info, "first");
        run.record(LogLevel::Warning, "second");

        assert_eq!(run.log.len(), 2);
        assert_eq!(run.log[0].message, "first");
        assert_eq!(run.log[1].level, LogLevel::Warning);
        assert!(run.log[0].timestamp <= run.log[1].timestamp);
    }

    #[test]
    fn finish_failed_sets_error_and_timestamp() {
        let mut run = Run::new("test");
        run.finish_failed("no model loaded");

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.as_deref(), Some("no model loaded"));
        assert!(run.finished_at.is_some());
        assert!(run.is_finished());
    }

    #[test]
    fn completed_count_ignores_pending_tasks() {
        let mut run = Run::new("test");
        run.tasks.push(Task::new("a", "a"));
        run.tasks.push(Task::new("b", "b"));
        run.tasks[0].start();
        run.tasks[0].complete("done");

        assert_eq!(run.completed_count(), 1);
    }

    #[test]
    fn run_state_serialization_roundtrip() {
        let state = RunState::ExecutingTask(2);
        let json = serde_json::to_string(&state).unwrap();
        let back: RunState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RunState::ExecutingTask(2));
    }
}

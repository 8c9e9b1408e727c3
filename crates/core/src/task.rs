//! Task domain types.
//!
//! A task is the unit of work produced by breaking an objective down:
//! a short name, a description, an urgency, a one-way lifecycle status,
//! and (once executed) a free-text result from the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How urgent a task is.
///
/// Ordering is `Low < Medium < High < Critical`, so sorting descending
/// puts critical work first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Parse a priority the way models actually write them: case-insensitive,
    /// surrounding whitespace ignored, anything unrecognized treated as medium.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Lowercase label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a task. Transitions are one-way:
/// pending → in-progress → completed | failed. Terminal states stick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single unit of work derived from an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Short human-readable label
    pub name: String,

    /// What doing this task actually involves
    pub description: String,

    /// Urgency, used to order execution
    #[serde(default)]
    pub priority: TaskPriority,

    /// Lifecycle status
    #[serde(default)]
    pub status: TaskStatus,

    /// Model-generated outcome, present once the task has been executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Declared prerequisites. Recorded but never consumed by scheduling —
    /// execution order comes from priority alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,

    /// Free-text effort estimate (e.g. "30 minutes"), informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,

    /// When this task was created
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending, medium-priority task.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: description.into(),
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            result: None,
            dependencies: Vec::new(),
            estimated_time: None,
            created_at: Utc::now(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the effort estimate.
    pub fn with_estimated_time(mut self, estimate: impl Into<String>) -> Self {
        self.estimated_time = Some(estimate.into());
        self
    }

    /// Move the task from pending to in-progress. No-op otherwise.
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
        }
    }

    /// Mark the task completed and store its result. No-op once terminal.
    pub fn complete(&mut self, result: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Completed;
            self.result = Some(result.into());
        }
    }

    /// Mark the task failed. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
        }
    }
}

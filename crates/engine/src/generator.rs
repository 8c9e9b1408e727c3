//! Stage one: turn an objective into a list of pending tasks.

use std::sync::Arc;

use taskforge_core::error::GenerationError;
use taskforge_core::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use taskforge_core::task::{Task, TaskPriority};
use tracing::{debug, warn};

use crate::parse::{ParseSource, ParsedBreakdown, TaskDraft, parse_task_breakdown};
use crate::prompt;

/// Prompts the backend for a task breakdown and parses whatever comes back.
pub struct TaskGenerator {
    generator: Arc<dyn TextGenerator>,
    model: String,
    options: GenerationOptions,
    min_tasks: usize,
    max_tasks: usize,
}

/// What generation produced: the tasks plus which parse tier made them.
#[derive(Debug, Clone)]
pub struct GeneratedTasks {
    pub tasks: Vec<Task>,
    pub source: ParseSource,
}

impl TaskGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            options: GenerationOptions::default(),
            min_tasks: 4,
            max_tasks: 7,
        }
    }

    /// Override the sampling parameters for the breakdown call.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Override how many tasks the prompt asks for.
    pub fn with_task_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_tasks = min;
        self.max_tasks = max;
        self
    }

    /// Break the objective down into tasks.
    ///
    /// Only a failure of the backend call itself propagates. A garbled
    /// response never errors: the parse tiers degrade through line
    /// heuristics down to the fixed default sequence.
    pub async fn generate_tasks(
        &self,
        objective: &str,
    ) -> Result<GeneratedTasks, GenerationError> {
        let prompt = prompt::breakdown_prompt(objective, self.min_tasks, self.max_tasks);
        let request = GenerationRequest::new(&self.model, prompt).with_options(self.options);

        let generation = self.generator.generate(request).await?;

        let ParsedBreakdown { drafts, source } = parse_task_breakdown(&generation.text);
        if source != ParseSource::Structured {
            warn!(
                source = source.as_str(),
                "Breakdown response was not a JSON array; degraded parse tier used"
            );
        }
        debug!(
            count = drafts.len(),
            source = source.as_str(),
            "Breakdown parsed"
        );

        let tasks = drafts.into_iter().map(draft_to_task).collect();
        Ok(GeneratedTasks { tasks, source })
    }
}

/// The fixed four-task list substituted when the breakdown call itself
/// fails.
pub fn default_task_list() -> Vec<Task> {
    crate::parse::default_drafts()
        .into_iter()
        .map(draft_to_task)
        .collect()
}

fn draft_to_task(draft: TaskDraft) -> Task {
    let priority = draft
        .priority
        .as_deref()
        .map(TaskPriority::parse_lenient)
        .unwrap_or_default();
    let description = if draft.description.trim().is_empty() {
        draft.name.clone()
    } else {
        draft.description
    };

    let mut task = Task::new(draft.name, description).with_priority(priority);
    if let Some(estimate) = draft.estimated_time {
        task = task.with_estimated_time(estimate);
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use taskforge_core::task::TaskStatus;

    #[tokio::test]
    async fn json_breakdown_maps_fields_verbatim() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[r#"[
            {"name": "Book flight", "description": "Reserve round-trip tickets", "priority": "high", "estimatedTime": "30 minutes"},
            {"name": "Pack bags", "description": "Pack for five days", "priority": "low"}
        ]"#]));

        let generator = TaskGenerator::new(backend.clone(), "mock-model");
        let generated = generator.generate_tasks("Plan a trip").await.unwrap();

        assert_eq!(generated.source, ParseSource::Structured);
        assert_eq!(generated.tasks.len(), 2);

        let first = &generated.tasks[0];
        assert_eq!(first.name, "Book flight");
        assert_eq!(first.description, "Reserve round-trip tickets");
        assert_eq!(first.priority, TaskPriority::High);
        assert_eq!(first.estimated_time.as_deref(), Some("30 minutes"));
        assert_eq!(first.status, TaskStatus::Pending);
        assert!(first.result.is_none());

        assert_eq!(generated.tasks[1].priority, TaskPriority::Low);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_priority_maps_to_medium() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[{"name": "Ship it", "description": "Release", "priority": "URGENT!!"}]"#,
        ]));

        let generator = TaskGenerator::new(backend, "mock-model");
        let generated = generator.generate_tasks("Release v2").await.unwrap();

        assert_eq!(generated.tasks[0].priority, TaskPriority::Medium);
    }

    #[tokio::test]
    async fn missing_description_reuses_name() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[{"name": "Solo"}]"#,
        ]));

        let generator = TaskGenerator::new(backend, "mock-model");
        let generated = generator.generate_tasks("obj").await.unwrap();

        assert_eq!(generated.tasks[0].description, "Solo");
    }

    #[tokio::test]
    async fn numbered_lines_fall_back_to_heuristic() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            "1. Research competitors\n2. Write positioning doc",
        ]));

        let generator = TaskGenerator::new(backend, "mock-model");
        let generated = generator.generate_tasks("Launch product").await.unwrap();

        assert_eq!(generated.source, ParseSource::Heuristic);
        assert_eq!(generated.tasks.len(), 2);
        assert_eq!(generated.tasks[0].name, "Research competitors");
        assert_eq!(generated.tasks[0].priority, TaskPriority::Medium);
    }

    #[tokio::test]
    async fn unusable_response_uses_default_sequence() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            "I'm sorry, I can't break that down.",
        ]));

        let generator = TaskGenerator::new(backend, "mock-model");
        let generated = generator.generate_tasks("obj").await.unwrap();

        assert_eq!(generated.source, ParseSource::DefaultSequence);
        let names: Vec<&str> = generated.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Initialize", "Plan", "Execute", "Validate"]);
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let backend = Arc::new(FailingGenerator::network());

        let generator = TaskGenerator::new(backend, "mock-model");
        let result = generator.generate_tasks("obj").await;

        assert!(matches!(result, Err(GenerationError::Network(_))));
    }

    #[test]
    fn default_task_list_is_four_pending_medium_tasks() {
        let tasks = default_task_list();

        assert_eq!(tasks.len(), 4);
        for task in &tasks {
            assert_eq!(task.priority, TaskPriority::Medium);
            assert_eq!(task.status, TaskStatus::Pending);
            assert!(!task.description.is_empty());
        }
    }
}

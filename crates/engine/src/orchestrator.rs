//! The pipeline orchestrator: one objective in, one finished run out.
//!
//! `process_objective` drives the three stages in order (generate,
//! prioritize, execute), recording every transition on the run's log and
//! publishing progress events. After intake there is no fatal path: stage
//! failures degrade to the default task list or the placeholder result and
//! the run still reaches `Completed`. Only two things stop a run outright,
//! both at intake: a backend with no loaded model, and a run already in
//! flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use taskforge_core::error::{Error, Result};
use taskforge_core::event::{EventBus, PipelineEvent};
use taskforge_core::generation::{GenerationOptions, TextGenerator};
use taskforge_core::run::{LogLevel, Run, RunState};
use tracing::{debug, info, warn};

use crate::executor::TaskExecutor;
use crate::generator::{TaskGenerator, default_task_list};
use crate::parse::ParseSource;

/// Drives one objective through generation, prioritization, and sequential
/// execution.
///
/// The generation capability and event bus are injected at construction;
/// the orchestrator holds no global state. One run at a time: a second
/// `process_objective` call while one is in flight is rejected.
pub struct Orchestrator {
    /// The text-generation backend
    generator: Arc<dyn TextGenerator>,

    /// The model to request
    model: String,

    /// Sampling parameters for the breakdown call
    generator_options: GenerationOptions,

    /// Sampling parameters for per-task execution calls
    executor_options: GenerationOptions,

    /// How many tasks the breakdown prompt asks for
    min_tasks: usize,
    max_tasks: usize,

    /// Pause between consecutive task executions, for observability pacing
    task_delay: Duration,

    /// Event bus for pipeline progress events
    event_bus: Arc<EventBus>,

    /// Set while a run is in flight
    busy: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator for the given backend and model.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            generator,
            model: model.into(),
            generator_options: GenerationOptions::default(),
            executor_options: TaskExecutor::default_options(),
            min_tasks: 4,
            max_tasks: 7,
            task_delay: Duration::from_millis(500),
            event_bus,
            busy: AtomicBool::new(false),
        }
    }

    /// Set the sampling parameters for the breakdown call.
    pub fn with_generator_options(mut self, options: GenerationOptions) -> Self {
        self.generator_options = options;
        self
    }

    /// Set the sampling parameters for per-task execution calls.
    pub fn with_executor_options(mut self, options: GenerationOptions) -> Self {
        self.executor_options = options;
        self
    }

    /// Set how many tasks the breakdown prompt asks for.
    pub fn with_task_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_tasks = min;
        self.max_tasks = max;
        self
    }

    /// Set the pause between consecutive task executions. Zero disables
    /// pacing.
    pub fn with_task_delay(mut self, delay: Duration) -> Self {
        self.task_delay = delay;
        self
    }

    /// Whether a run is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run the full pipeline for one objective.
    ///
    /// Returns the finished `Run`. `Err` is reserved for refusing to start:
    /// a concurrent second call gets `Error::RunInProgress`. Every condition
    /// after intake, including the no-model precondition, is reported on the
    /// returned run itself.
    pub async fn process_objective(&self, objective: &str) -> Result<Run> {
        // Overlapping runs are rejected, not queued or cancelled.
        let _busy = BusyGuard::acquire(&self.busy)?;

        let mut run = Run::new(objective);
        info!(run_id = %run.id, objective = %run.objective, "Run started");
        self.event_bus.publish(PipelineEvent::RunStarted {
            run_id: run.id.to_string(),
            objective: run.objective.clone(),
            timestamp: Utc::now(),
        });
        run.record(LogLevel::Info, format!("Objective received: {objective}"));

        // Precondition: a model must be ready before any generation call.
        if !self.generator.has_loaded_model().await {
            warn!(
                run_id = %run.id,
                backend = self.generator.name(),
                "No model loaded; refusing to start"
            );
            run.record(LogLevel::Error, "No model loaded");
            run.finish_failed("No model loaded");
            self.event_bus.publish(PipelineEvent::RunFailed {
                run_id: run.id.to_string(),
                reason: "No model loaded".into(),
                timestamp: Utc::now(),
            });
            return Ok(run);
        }

        // ── Stage 1: generate tasks ─────────────────────────────────────
        run.set_state(RunState::GeneratingTasks);
        run.record(LogLevel::Info, "Generating tasks");

        let task_generator = TaskGenerator::new(self.generator.clone(), &self.model)
            .with_options(self.generator_options)
            .with_task_bounds(self.min_tasks, self.max_tasks);

        let source = match task_generator.generate_tasks(&run.objective).await {
            Ok(generated) => {
                match generated.source {
                    ParseSource::Structured => {
                        run.record(
                            LogLevel::Success,
                            format!("Generated {} tasks", generated.tasks.len()),
                        );
                    }
                    ParseSource::Heuristic => {
                        run.record(
                            LogLevel::Warning,
                            format!(
                                "Breakdown was not a JSON array; salvaged {} tasks from its lines",
                                generated.tasks.len()
                            ),
                        );
                    }
                    ParseSource::DefaultSequence => {
                        run.record(
                            LogLevel::Warning,
                            "Breakdown was unusable; using the default task sequence",
                        );
                    }
                }
                run.tasks = generated.tasks;
                generated.source.as_str()
            }
            Err(e) => {
                // The run degrades instead of dying: substitute the fixed
                // sequence, note the failure, keep going.
                warn!(run_id = %run.id, error = %e, "Task generation failed; using default task list");
                run.error = Some(format!("Task generation failed: {e}"));
                run.record(
                    LogLevel::Warning,
                    format!("Task generation failed ({e}); using the default task sequence"),
                );
                run.tasks = default_task_list();
                ParseSource::DefaultSequence.as_str()
            }
        };

        self.event_bus.publish(PipelineEvent::TasksGenerated {
            run_id: run.id.to_string(),
            count: run.tasks.len(),
            source: source.to_string(),
            timestamp: Utc::now(),
        });

        // ── Stage 2: prioritize ─────────────────────────────────────────
        run.set_state(RunState::Prioritizing);
        // Stable sort, descending: critical first, ties keep generated order.
        run.tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        run.record(
            LogLevel::Info,
            format!("Prioritized {} tasks", run.tasks.len()),
        );
        debug!(run_id = %run.id, count = run.tasks.len(), "Tasks prioritized");

        // ── Stage 3: execute sequentially ───────────────────────────────
        let executor = TaskExecutor::new(self.generator.clone(), &self.model)
            .with_options(self.executor_options);

        let total = run.tasks.len();
        for index in 0..total {
            run.set_state(RunState::ExecutingTask(index));
            run.tasks[index].start();

            let task_id = run.tasks[index].id.to_string();
            let task_name = run.tasks[index].name.clone();

            info!(run_id = %run.id, task = %task_name, index, "Executing task");
            run.record(LogLevel::Info, format!("Executing: {task_name}"));
            self.event_bus.publish(PipelineEvent::TaskStarted {
                run_id: run.id.to_string(),
                task_id: task_id.clone(),
                name: task_name.clone(),
                timestamp: Utc::now(),
            });

            let snapshot = run.tasks[index].clone();
            let outcome = executor.execute(&run.objective, &snapshot).await;
            let duration_ms = outcome.duration.as_millis() as u64;

            if outcome.fell_back {
                run.record(
                    LogLevel::Warning,
                    format!("Execution call failed for '{task_name}'; recorded placeholder result"),
                );
            } else {
                run.record(LogLevel::Success, format!("Completed: {task_name}"));
            }
            run.tasks[index].complete(outcome.result);

            self.event_bus.publish(PipelineEvent::TaskCompleted {
                run_id: run.id.to_string(),
                task_id,
                fell_back: outcome.fell_back,
                duration_ms,
                timestamp: Utc::now(),
            });

            // Pacing between tasks only; nothing to wait for after the last.
            if index + 1 < total && !self.task_delay.is_zero() {
                tokio::time::sleep(self.task_delay).await;
            }
        }

        // Terminal regardless of per-task fallbacks.
        let completed = run.completed_count();
        run.record(
            LogLevel::Success,
            format!("Run complete: {completed}/{total} tasks executed"),
        );
        run.finish_completed();
        info!(run_id = %run.id, tasks = total, "Run complete");
        self.event_bus.publish(PipelineEvent::RunCompleted {
            run_id: run.id.to_string(),
            tasks_completed: completed,
            timestamp: Utc::now(),
        });

        Ok(run)
    }
}

/// Holds the orchestrator's busy flag, releasing it on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(Error::RunInProgress);
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SIMULATED_RESULT;
    use crate::test_helpers::*;
    use taskforge_core::error::GenerationError;
    use taskforge_core::generation::{Generation, GenerationRequest};
    use taskforge_core::task::{TaskPriority, TaskStatus};

    fn orchestrator(backend: Arc<dyn TextGenerator>) -> Orchestrator {
        Orchestrator::new(backend, "mock-model", Arc::new(EventBus::default()))
            .with_task_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn full_pipeline_orders_and_completes_tasks() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[
                {"name": "Tidy up", "description": "Clean the workspace", "priority": "low"},
                {"name": "Fix outage", "description": "Restore the service", "priority": "critical"},
                {"name": "Write notes", "description": "Summarize findings", "priority": "medium"},
                {"name": "Notify customers", "description": "Send the status mail", "priority": "high"}
            ]"#,
            "Outage fixed.",
            "Customers notified.",
            "Notes written.",
            "Workspace tidied.",
        ]));

        let run = orchestrator(backend.clone())
            .process_objective("Recover from the incident")
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Completed);
        assert!(run.error.is_none());
        assert!(run.finished_at.is_some());

        let names: Vec<&str> = run.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["Fix outage", "Notify customers", "Write notes", "Tidy up"]
        );

        // Results land in execution (priority) order.
        assert_eq!(run.tasks[0].result.as_deref(), Some("Outage fixed."));
        assert_eq!(run.tasks[3].result.as_deref(), Some("Workspace tidied."));
        assert!(run.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(run.completed_count(), 4);

        // One breakdown call plus one execution call per task.
        assert_eq!(backend.call_count(), 5);
    }

    #[tokio::test]
    async fn no_loaded_model_fails_before_any_call() {
        let run = orchestrator(Arc::new(UnloadedGenerator))
            .process_objective("Plan a trip")
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.as_deref(), Some("No model loaded"));
        assert!(run.tasks.is_empty());
        assert!(run.finished_at.is_some());
        assert!(
            run.log
                .iter()
                .any(|entry| entry.level == LogLevel::Error && entry.message == "No model loaded")
        );
    }

    #[tokio::test]
    async fn breakdown_failure_degrades_to_default_tasks() {
        // Every call fails: the breakdown degrades to the default list and
        // each execution degrades to the placeholder. The run still completes.
        let run = orchestrator(Arc::new(FailingGenerator::network()))
            .process_objective("Plan a trip")
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Completed);
        assert!(run.error.as_deref().unwrap().contains("Task generation failed"));

        let names: Vec<&str> = run.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Initialize", "Plan", "Execute", "Validate"]);
        for task in &run.tasks {
            assert_eq!(task.status, TaskStatus::Completed);
            assert_eq!(task.result.as_deref(), Some(SIMULATED_RESULT));
        }
    }

    #[tokio::test]
    async fn execution_failure_does_not_stop_the_run() {
        let backend = Arc::new(SequentialMockGenerator::new(vec![
            Ok(make_generation(
                r#"[{"name": "First", "description": "d1"}, {"name": "Second", "description": "d2"}]"#,
            )),
            Err(GenerationError::Timeout("120s elapsed".into())),
            Ok(make_generation("Second done.")),
        ]));

        let run = orchestrator(backend)
            .process_objective("obj")
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Completed);
        assert_eq!(run.tasks[0].status, TaskStatus::Completed);
        assert_eq!(run.tasks[0].result.as_deref(), Some(SIMULATED_RESULT));
        assert_eq!(run.tasks[1].result.as_deref(), Some("Second done."));
        assert!(
            run.log
                .iter()
                .any(|entry| entry.level == LogLevel::Warning
                    && entry.message.contains("placeholder"))
        );
    }

    #[tokio::test]
    async fn equal_priorities_keep_generated_order() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[{"name": "A", "description": "a"}, {"name": "B", "description": "b"}, {"name": "C", "description": "c"}]"#,
            "ra",
            "rb",
            "rc",
        ]));

        let run = orchestrator(backend)
            .process_objective("obj")
            .await
            .unwrap();

        let names: Vec<&str> = run.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(
            run.tasks
                .iter()
                .all(|t| t.priority == TaskPriority::Medium)
        );
    }

    #[tokio::test]
    async fn events_track_the_run() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[{"name": "Only task", "description": "d", "priority": "high"}]"#,
            "Done.",
        ]));
        let event_bus = Arc::new(EventBus::default());
        let mut rx = event_bus.subscribe();

        let orchestrator = Orchestrator::new(backend, "mock-model", event_bus)
            .with_task_delay(Duration::ZERO);
        let run = orchestrator.process_objective("obj").await.unwrap();

        match rx.recv().await.unwrap().as_ref() {
            PipelineEvent::RunStarted { run_id, objective, .. } => {
                assert_eq!(run_id, &run.id.to_string());
                assert_eq!(objective, "obj");
            }
            other => panic!("Expected RunStarted, got {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            PipelineEvent::TasksGenerated { count, source, .. } => {
                assert_eq!(*count, 1);
                assert_eq!(source, "structured");
            }
            other => panic!("Expected TasksGenerated, got {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            PipelineEvent::TaskStarted { name, .. } => assert_eq!(name, "Only task"),
            other => panic!("Expected TaskStarted, got {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            PipelineEvent::TaskCompleted { fell_back, .. } => assert!(!fell_back),
            other => panic!("Expected TaskCompleted, got {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            PipelineEvent::RunCompleted { tasks_completed, .. } => {
                assert_eq!(*tasks_completed, 1);
            }
            other => panic!("Expected RunCompleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_log_records_stage_transitions() {
        let backend = Arc::new(SequentialMockGenerator::from_texts(&[
            r#"[{"name": "Only task", "description": "d"}]"#,
            "Done.",
        ]));

        let run = orchestrator(backend)
            .process_objective("obj")
            .await
            .unwrap();

        assert!(run.log[0].message.contains("Objective received"));
        assert!(run.log.iter().any(|e| e.message.contains("Generated 1 tasks")));
        assert!(run.log.iter().any(|e| e.message.contains("Prioritized")));
        assert!(run.log.iter().any(|e| e.message.contains("Executing: Only task")));
        assert!(
            run.log
                .last()
                .unwrap()
                .message
                .contains("Run complete: 1/1")
        );
    }

    /// A generator slow enough that a test can overlap a second run with it.
    struct SlowGenerator {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl TextGenerator for SlowGenerator {
        fn name(&self) -> &str {
            "slow_mock"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> std::result::Result<Generation, GenerationError> {
            tokio::time::sleep(self.delay).await;
            Ok(make_generation("1. Single step"))
        }
    }

    #[tokio::test]
    async fn second_concurrent_run_is_rejected() {
        let backend = Arc::new(SlowGenerator {
            delay: Duration::from_millis(50),
        });
        let orchestrator = Arc::new(orchestrator(backend));

        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.process_objective("first objective").await }
        });

        // Give the first run time to reach the backend and hold the flag.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(orchestrator.is_busy());

        let second = orchestrator.process_objective("second objective").await;
        assert!(matches!(second, Err(Error::RunInProgress)));

        let run = first.await.unwrap().unwrap();
        assert_eq!(run.state, RunState::Completed);

        // The flag is released once the run finishes.
        assert!(!orchestrator.is_busy());
        let after = orchestrator.process_objective("third objective").await;
        assert!(after.is_ok());
    }
}

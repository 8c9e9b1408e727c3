//! Stage three: execute one task at a time against the backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskforge_core::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use taskforge_core::task::Task;
use tracing::{debug, warn};

use crate::prompt;

/// The placeholder result recorded when a task's backend call fails.
pub const SIMULATED_RESULT: &str = "Task completed (simulated)";

/// Produces a short free-text result for a single task.
///
/// Execution never fails the run: a backend error is absorbed into the
/// placeholder result so the remaining tasks still get their turn.
pub struct TaskExecutor {
    generator: Arc<dyn TextGenerator>,
    model: String,
    options: GenerationOptions,
}

/// What executing one task produced.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// The result text to store on the task
    pub result: String,

    /// True when the backend call failed and `SIMULATED_RESULT` was
    /// substituted
    pub fell_back: bool,

    /// Wall-clock duration of the backend call
    pub duration: Duration,
}

impl TaskExecutor {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            options: Self::default_options(),
        }
    }

    /// Execution-stage sampling defaults: shorter and cooler than the
    /// breakdown stage.
    pub fn default_options() -> GenerationOptions {
        GenerationOptions {
            max_tokens: 256,
            temperature: 0.4,
            top_p: 0.95,
        }
    }

    /// Override the sampling parameters for execution calls.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one task. Infallible by contract: a failed call produces the
    /// placeholder result with `fell_back` set.
    pub async fn execute(&self, objective: &str, task: &Task) -> ExecutionOutcome {
        let prompt = prompt::execution_prompt(objective, task);
        let request = GenerationRequest::new(&self.model, prompt).with_options(self.options);

        let start = Instant::now();
        match self.generator.generate(request).await {
            Ok(generation) => {
                debug!(task = %task.name, "Task executed");
                ExecutionOutcome {
                    result: generation.text.trim().to_string(),
                    fell_back: false,
                    duration: start.elapsed(),
                }
            }
            Err(e) => {
                warn!(task = %task.name, error = %e, "Execution call failed; recording simulated result");
                ExecutionOutcome {
                    result: SIMULATED_RESULT.to_string(),
                    fell_back: true,
                    duration: start.elapsed(),
                }
            }
        }
    }
}

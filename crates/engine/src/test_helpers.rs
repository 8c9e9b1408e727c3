//! Shared test helpers for pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use taskforge_core::error::GenerationError;
use taskforge_core::generation::{Generation, GenerationRequest, TextGenerator, Usage};

/// A mock generator that returns a sequence of scripted outcomes.
///
/// Each call to `generate` returns the next entry in the queue.
/// Panics if more calls are made than outcomes provided.
pub struct SequentialMockGenerator {
    outcomes: Mutex<Vec<Result<Generation, GenerationError>>>,
    call_count: Mutex<usize>,
}

impl SequentialMockGenerator {
    pub fn new(outcomes: Vec<Result<Generation, GenerationError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            call_count: Mutex::new(0),
        }
    }

    /// Create a generator that answers every call with the given texts, in
    /// order.
    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_generation(t))).collect())
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for SequentialMockGenerator {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<Generation, GenerationError> {
        let mut count = self.call_count.lock().unwrap();
        let outcomes = self.outcomes.lock().unwrap();

        if *count >= outcomes.len() {
            panic!(
                "SequentialMockGenerator: no more outcomes (call #{}, have {})",
                *count,
                outcomes.len()
            );
        }

        let outcome = outcomes[*count].clone();
        *count += 1;
        outcome
    }
}

/// A generator whose every call fails with the same error.
pub struct FailingGenerator {
    error: GenerationError,
}

impl FailingGenerator {
    pub fn new(error: GenerationError) -> Self {
        Self { error }
    }

    /// A failing generator with a generic network error.
    pub fn network() -> Self {
        Self::new(GenerationError::Network("connection refused".into()))
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<Generation, GenerationError> {
        Err(self.error.clone())
    }
}

/// A generator that reports no model loaded. `generate` panics: the
/// pipeline must never reach it.
pub struct UnloadedGenerator;

#[async_trait]
impl TextGenerator for UnloadedGenerator {
    fn name(&self) -> &str {
        "unloaded_mock"
    }

    async fn has_loaded_model(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<Generation, GenerationError> {
        panic!("generate called on a backend with no loaded model");
    }
}

/// Create a `Generation` carrying the given text.
pub fn make_generation(text: &str) -> Generation {
    Generation {
        text: text.to_string(),
        model: "mock-model".into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

//! Scripted generator for analysis tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::client::{GenerateError, Generator};

/// Replays queued outcomes in order and records every prompt and timeout.
///
/// Once the queue is empty every call returns `fallback`.
pub(crate) struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<Result<String, fn() -> GenerateError>>>,
    fallback: Result<String, fn() -> GenerateError>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedGenerator {
    /// Always answers `text`.
    pub fn answering(text: &str) -> Self {
        Self {
            outcomes: Mutex::default(),
            fallback: Ok(text.to_string()),
            calls: Mutex::default(),
        }
    }

    /// Always fails with `error()`.
    pub fn failing(error: fn() -> GenerateError) -> Self {
        Self {
            outcomes: Mutex::default(),
            fallback: Err(error),
            calls: Mutex::default(),
        }
    }

    pub fn then_ok(self, text: &str) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(text.to_string()));
        self
    }

    pub fn then_err(self, error: fn() -> GenerateError) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(prompt, _)| prompt.clone())
            .collect()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, timeout)| *timeout)
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError> {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt.to_string(), timeout));

        let next = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map_err(|error| error())
    }
}

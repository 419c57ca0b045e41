use super::GenerationProvider;
use crate::assembler::ContentTurn;
use crate::contract::OutputShape;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A single recorded invocation of [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    pub with_media: bool,
    pub model_id: String,
    pub temperature: f32,
    pub turns: Vec<ContentTurn>,
    pub output_shape: Option<OutputShape>,
}

/// Scripted provider: replays queued responses in order and records every call.
///
/// Once the queue is drained it echoes the last turn's text.
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.into()));
        self
    }

    pub fn with_error(self, error: Error) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Sleep before answering, to exercise deadlines and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(
        &self,
        with_media: bool,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(ProviderCall {
            with_media,
            model_id: model_id.to_string(),
            temperature,
            turns: turns.to_vec(),
            output_shape: output_shape.cloned(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => Ok(turns
                .last()
                .map(ContentTurn::joined_text)
                .unwrap_or_default()),
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate_from_text(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        self.respond(false, model_id, temperature, turns, output_shape)
            .await
    }

    async fn generate_from_text_and_media(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        self.respond(true, model_id, temperature, turns, output_shape)
            .await
    }
}

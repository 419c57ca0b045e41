//! Generation orchestration.
//!
//! One call walks `Validating -> Assembling -> Invoking -> Reconciling -> Done`,
//! dropping to `Failed` from any stage. Nothing is shared between calls except
//! the provider handle, so concurrent calls need no locking.

use crate::ai::GenerationProvider;
use crate::assembler::ContentAssembler;
use crate::contract;
use crate::models::{GenerationRequest, GenerationResult};
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Validating,
    Assembling,
    Invoking,
    Reconciling,
    Done,
    Failed,
}

impl Stage {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Stage::Validating,
            1 => Stage::Assembling,
            2 => Stage::Invoking,
            3 => Stage::Reconciling,
            4 => Stage::Done,
            _ => Stage::Failed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Assembling => "assembling",
            Stage::Invoking => "invoking",
            Stage::Reconciling => "reconciling",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage so a deadline or cancellation can report where it hit.
struct StageCell(AtomicU8);

impl StageCell {
    fn new() -> Self {
        Self(AtomicU8::new(Stage::Validating as u8))
    }

    fn set(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Relaxed);
    }

    fn get(&self) -> Stage {
        Stage::from_u8(self.0.load(Ordering::Relaxed))
    }
}

/// Per-call deadline and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub deadline: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Stateless façade over assembly, the provider call and output reconciliation.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn GenerationProvider>,
    assembler: ContentAssembler,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            assembler: ContentAssembler::new(),
        }
    }

    pub fn with_assembler(mut self, assembler: ContentAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.run_with(request, CallOptions::default()).await
    }

    pub async fn run_with(
        &self,
        request: &GenerationRequest,
        options: CallOptions,
    ) -> Result<GenerationResult> {
        let call_id = Uuid::new_v4();
        let op = if request.media.is_some() {
            "generate_image"
        } else {
            "generate_text"
        };
        let span = tracing::info_span!("generation", op, %call_id, model = %request.model_id);

        async move {
            let started = Instant::now();
            let stage = StageCell::new();

            let outcome = match request.validate() {
                Ok(()) => self.bounded(request, &stage, &options).await,
                Err(e) => Err(e),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok(result) => {
                    info!(
                        elapsed_ms,
                        structured = result.structured.is_some(),
                        "Generation succeeded"
                    );
                }
                Err(e) => {
                    error!(
                        elapsed_ms,
                        stage = %stage.get(),
                        code = e.code(),
                        category = e.category().as_str(),
                        "Generation failed: {}",
                        e
                    );
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Applies the caller's deadline and cancellation to the assemble→reconcile pipeline.
    async fn bounded(
        &self,
        request: &GenerationRequest,
        stage: &StageCell,
        options: &CallOptions,
    ) -> Result<GenerationResult> {
        let pipeline = async {
            match options.deadline {
                Some(deadline) => tokio::time::timeout(deadline, self.execute(request, stage))
                    .await
                    .unwrap_or_else(|_| Err(Error::Timeout)),
                None => self.execute(request, stage).await,
            }
        };

        match &options.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    outcome = pipeline => outcome,
                }
            }
            None => pipeline.await,
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        stage: &StageCell,
    ) -> Result<GenerationResult> {
        stage.set(Stage::Assembling);
        let turns = self.assembler.assemble(request).await?;
        let shape = contract::shape_output(request.schema.as_ref());

        stage.set(Stage::Invoking);
        let raw_text = if request.media.is_some() {
            self.provider
                .generate_from_text_and_media(
                    &request.model_id,
                    request.temperature,
                    &turns,
                    shape.as_ref(),
                )
                .await?
        } else {
            self.provider
                .generate_from_text(
                    &request.model_id,
                    request.temperature,
                    &turns,
                    shape.as_ref(),
                )
                .await?
        };

        stage.set(Stage::Reconciling);
        let result = contract::reconcile(raw_text, shape.as_ref());
        stage.set(Stage::Done);
        Ok(result)
    }
}

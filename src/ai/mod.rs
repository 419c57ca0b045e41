//! Generative backend integration
//!
//! [`GenerationProvider`] is the seam between the orchestrator and a concrete
//! model backend. Gemini is the only real binding; [`MockProvider`] stands in
//! for it in tests.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::GeminiProvider;
pub use mock::{MockProvider, ProviderCall};

use crate::assembler::ContentTurn;
use crate::contract::OutputShape;
use crate::Result;
use async_trait::async_trait;

/// One outbound backend request per call. Implementations never retry or cache,
/// and must be safe to share across concurrent calls.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_from_text(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String>;

    async fn generate_from_text_and_media(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String>;
}

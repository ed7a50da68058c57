//! Text generation.
//!
//! [`Generator`] sends a prompt to a generative model and returns its text.
//! The cascade only depends on the trait; [`GeminiGenerator`] (feature
//! `gemini`) is the hosted implementation.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiGenerator, DEFAULT_GEMINI_BASE_URL};

use crate::error::GenerationError;
use async_trait::async_trait;

/// Prompt in, text out.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, recorded in logs.
    fn model_id(&self) -> &str;

    /// Returns the model's text for `prompt`.
    ///
    /// Implementations return the raw text; callers trim and interpret it.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

//! WordPiece tokenization for the embedding model.

use crate::error::EmbeddingError;
use std::path::Path;
use tokenizers::tokenizer::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

/// A Hugging Face tokenizer configured to truncate at `max_length` tokens.
///
/// Truncation counts the `[CLS]`/`[SEP]` special tokens, so the output
/// always fits the model's position table.
#[derive(Clone)]
pub struct TokenizerHandle {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TokenizerHandle {
    /// Creates a tokenizer from `tokenizer.json` bytes.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::TokenizerUnavailable` if the JSON is not a
    /// valid tokenizer.
    pub fn from_bytes(tokenizer_bytes: &[u8], max_length: usize) -> Result<Self, EmbeddingError> {
        let mut tokenizer = Tokenizer::from_bytes(tokenizer_bytes).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!("Failed to deserialize tokenizer: {}", e))
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                stride: 0,
                strategy: TruncationStrategy::LongestFirst,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| {
                EmbeddingError::InvalidConfig(format!("Failed to configure truncation: {}", e))
            })?;
        // Padding is handled by the model's batch path
        tokenizer.with_padding(None);

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Reads `tokenizer.json` from disk.
    pub fn from_file(path: &Path, max_length: usize) -> Result<Self, EmbeddingError> {
        let bytes = std::fs::read(path).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes, max_length)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenizes text into token IDs, including special tokens.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::TokenizationFailed` if encoding fails or
    /// yields no tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::TokenizationFailed(format!("Encoding failed: {}", e)))?;

        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(EmbeddingError::TokenizationFailed(
                "Tokenizer returned no tokens".to_string(),
            ));
        }
        Ok(ids.to_vec())
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

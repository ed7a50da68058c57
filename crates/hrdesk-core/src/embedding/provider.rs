//! Local embedding provider backed by the MiniLM model.

use super::config::MiniLmConfig;
use super::model::MiniLmEmbedder;
use super::tokenizer::TokenizerHandle;
use super::traits::{Embedder, EmbeddingProvider, ModelConfig};
use crate::config::MAX_EMBEDDING_TOKENS;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// File names inside a model directory, as published on the Hugging Face hub.
pub const MODEL_WEIGHTS_FILE: &str = "model.safetensors";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const MODEL_CONFIG_FILE: &str = "config.json";

/// Runs tokenization and inference on tokio's blocking pool.
#[derive(Clone)]
pub struct LocalEmbeddingProvider {
    tokenizer: Arc<TokenizerHandle>,
    model: Arc<MiniLmEmbedder>,
}

impl LocalEmbeddingProvider {
    pub fn new(tokenizer: TokenizerHandle, model: MiniLmEmbedder) -> Self {
        Self {
            tokenizer: Arc::new(tokenizer),
            model: Arc::new(model),
        }
    }

    /// Loads `model.safetensors`, `tokenizer.json` and (optionally)
    /// `config.json` from a model directory.
    ///
    /// Without `config.json` the all-MiniLM-L6-v2 defaults are used.
    pub fn from_dir(dir: &Path) -> Result<Self, EmbeddingError> {
        let config_path = dir.join(MODEL_CONFIG_FILE);
        let config = if config_path.exists() {
            let bytes = std::fs::read(&config_path).map_err(|e| {
                EmbeddingError::ModelLoad(format!("{}: {}", config_path.display(), e))
            })?;
            MiniLmConfig::from_json_bytes(&bytes)?
        } else {
            MiniLmConfig::default()
        };

        let weights_path = dir.join(MODEL_WEIGHTS_FILE);
        let model_bytes = std::fs::read(&weights_path).map_err(|e| {
            EmbeddingError::ModelLoad(format!("{}: {}", weights_path.display(), e))
        })?;

        let max_tokens = MAX_EMBEDDING_TOKENS.min(config.max_sequence_length());
        let tokenizer = TokenizerHandle::from_file(&dir.join(TOKENIZER_FILE), max_tokens)?;
        let model = MiniLmEmbedder::from_bytes(model_bytes, config.clone())?;

        info!(
            model_dir = %dir.display(),
            model = config.model_id(),
            dimension = config.embedding_dim(),
            vocab_size = tokenizer.vocab_size(),
            max_tokens,
            "Embedding provider ready"
        );
        Ok(Self::new(tokenizer, model))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn model_id(&self) -> &str {
        ModelConfig::model_id(self.model.config())
    }

    fn dimension(&self) -> usize {
        self.model.embedding_dim()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokenizer = self.tokenizer.clone();
        let model = self.model.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let token_ids = tokenizer.tokenize(&text)?;
            model.embed_tokens(token_ids)
        })
        .await
        .map_err(|e| EmbeddingError::InferenceFailed(format!("Embedding task failed: {}", e)))?
    }
}

//! Builds the shared [`Assistant`] from CLI options.

use crate::config::{self, AppOptions};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hrdesk_core::embedding::{EmbeddingProvider, LocalEmbeddingProvider};
use hrdesk_core::error::GenerationError;
use hrdesk_core::generation::{GeminiConfig, GeminiGenerator, Generator};
use hrdesk_core::storage::{DistanceMetric, RedbVectorStore};
use hrdesk_core::{Assistant, IngestionOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Stand-in used by commands that never generate (`status`, `reset`, `ingest`).
struct MissingCredential;

#[async_trait]
impl Generator for MissingCredential {
    fn model_id(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::InvalidConfig(
            "GOOGLE_API_KEY is not set".to_string(),
        ))
    }
}

/// Everything a surface needs to run.
pub struct AppContext {
    pub assistant: Arc<Assistant>,
    pub corpus_dir: PathBuf,
}

impl AppContext {
    /// Loads the embedding model, opens the store and connects the generator.
    ///
    /// With `answering` set, a missing API key is a startup error.
    pub async fn build(options: &AppOptions, answering: bool) -> Result<Self> {
        let assistant_config = options.assistant_config()?;

        let generator: Arc<dyn Generator> = match options.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {
                let config = GeminiConfig::new(key)
                    .with_model(&options.gemini_model)
                    .with_timeout(assistant_config.generate_retry.timeout);
                Arc::new(GeminiGenerator::new(config).context("Failed to set up Gemini client")?)
            }
            _ if answering => {
                bail!("GOOGLE_API_KEY is not set. Export it or pass --api-key.")
            }
            _ => Arc::new(MissingCredential),
        };

        let model_dir = config::find_model_dir(options.model_dir.as_ref())?;
        let embedder =
            tokio::task::spawn_blocking(move || LocalEmbeddingProvider::from_dir(&model_dir))
                .await
                .context("Embedding model loader panicked")?
                .context("Failed to load embedding model")?;

        let db_path = config::database_path(options.data_dir.as_ref())?;
        let store = RedbVectorStore::open(&db_path, embedder.dimension(), DistanceMetric::Cosine)
            .with_context(|| format!("Failed to open vector store: {}", db_path.display()))?;
        info!(path = %db_path.display(), "Vector store opened");

        let assistant = Assistant::new(
            Arc::new(embedder),
            generator,
            Arc::new(store),
            assistant_config,
        )
        .context("Failed to start assistant")?;

        Ok(Self {
            assistant: Arc::new(assistant),
            corpus_dir: options.corpus_dir.clone(),
        })
    }

    /// Ingests the corpus on first start; later starts return immediately.
    pub async fn ensure_policies(&self) -> Result<IngestionOutcome> {
        let outcome = self
            .assistant
            .ensure_policies(&self.corpus_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to ingest HR policies from {}",
                    self.corpus_dir.display()
                )
            })?;

        match outcome {
            IngestionOutcome::Ingested { chunks, files, .. } => {
                info!(chunks, files, "HR policies ingested");
            }
            IngestionOutcome::AlreadyComplete { .. } => {}
            IngestionOutcome::InProgressElsewhere { started_at } => {
                warn!(
                    started_at,
                    "Another process is ingesting policies; answers may fall back until it finishes"
                );
            }
        }
        Ok(outcome)
    }
}

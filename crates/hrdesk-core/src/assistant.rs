//! The application context shared by every surface.
//!
//! An [`Assistant`] is built once at startup from a provider pair and a
//! store, then shared behind `Arc` by the CLI, chat loop, web server and
//! MCP server.
//!
//! # Example
//!
//! ```ignore
//! let assistant = Assistant::new(embedder, generator, store, AssistantConfig::default())?;
//! assistant.ensure_policies(Path::new("data")).await?;
//! if let Some(answer) = assistant.ask("What is the notice period?").await? {
//!     println!("[{}] {}", answer.source.badge(), answer.text);
//! }
//! ```

use crate::cascade::{AnswerCascade, AnswerResult, CascadeSettings, MemoryPolicy, Question};
use crate::config::{DEFAULT_STALE_INGESTION, MEMORY_DISTANCE_THRESHOLD, SUGGESTED_QUESTIONS};
use crate::embedding::EmbeddingProvider;
use crate::error::AssistantError;
use crate::generation::Generator;
use crate::ingest::{IngestionOutcome, PolicyIngestor};
use crate::metrics::{AssistantMetrics, MetricsSnapshot};
use crate::retry::RetryPolicy;
use crate::storage::{Collection, IngestionState, StoreError, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runtime settings for an [`Assistant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Memory hits must be strictly closer than this.
    pub memory_threshold: f32,
    pub memory: MemoryPolicy,
    pub embed_retry: RetryPolicy,
    pub generate_retry: RetryPolicy,
    /// Ingestion claims older than this are reclaimed (seconds).
    #[serde(with = "secs")]
    pub stale_ingestion: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            memory_threshold: MEMORY_DISTANCE_THRESHOLD,
            memory: MemoryPolicy::default(),
            embed_retry: RetryPolicy::default(),
            generate_retry: RetryPolicy::default(),
            stale_ingestion: DEFAULT_STALE_INGESTION,
        }
    }
}

impl AssistantConfig {
    pub fn with_memory_policy(mut self, memory: MemoryPolicy) -> Self {
        self.memory = memory;
        self
    }

    /// Applies the same timeout to embedding and generation calls.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.embed_retry.timeout = timeout;
        self.generate_retry.timeout = timeout;
        self
    }

    /// Attempts per provider call, including the first; `1` disables retries.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        let attempts = attempts.max(1);
        self.embed_retry.max_attempts = attempts;
        self.generate_retry.max_attempts = attempts;
        self
    }

    pub fn with_stale_ingestion(mut self, stale: Duration) -> Self {
        self.stale_ingestion = stale;
        self
    }

    fn cascade_settings(&self) -> CascadeSettings {
        CascadeSettings {
            memory_threshold: self.memory_threshold,
            memory: self.memory,
            embed_retry: self.embed_retry,
            generate_retry: self.generate_retry,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Collection counts and ingestion marker, as reported by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub policy_chunks: usize,
    pub memory_entries: usize,
    pub ingestion: IngestionState,
    pub embedding_model: String,
    pub generation_model: String,
}

/// HR question-answering assistant.
pub struct Assistant {
    cascade: AnswerCascade,
    ingestor: PolicyIngestor,
    store: Arc<dyn VectorStore>,
    metrics: AssistantMetrics,
    embedding_model: String,
    generation_model: String,
}

impl Assistant {
    /// Wires providers and store together.
    ///
    /// # Errors
    ///
    /// [`StoreError::DimensionMismatch`] if the store was created for a
    /// different embedding size than the provider produces.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
        config: AssistantConfig,
    ) -> Result<Self, AssistantError> {
        if embedder.dimension() != store.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }

        let metrics = AssistantMetrics::new();
        let embedding_model = embedder.model_id().to_string();
        let generation_model = generator.model_id().to_string();

        let ingestor = PolicyIngestor::new(embedder.clone(), store.clone(), metrics.clone())
            .with_retry(config.embed_retry)
            .with_stale_after(config.stale_ingestion);
        let cascade = AnswerCascade::new(
            embedder,
            generator,
            store.clone(),
            config.cascade_settings(),
            metrics.clone(),
        );

        info!(
            embedding_model = %embedding_model,
            generation_model = %generation_model,
            metric = %store.metric(),
            "Assistant ready"
        );

        Ok(Self {
            cascade,
            ingestor,
            store,
            metrics,
            embedding_model,
            generation_model,
        })
    }

    /// Runs the answer cascade for one question.
    pub async fn answer(&self, question: &Question) -> Result<AnswerResult, AssistantError> {
        self.cascade.answer(question).await
    }

    /// Like [`answer`](Self::answer), but takes raw input.
    ///
    /// Blank input is not an error: it yields `Ok(None)` and touches
    /// neither provider nor store.
    pub async fn ask(&self, text: &str) -> Result<Option<AnswerResult>, AssistantError> {
        match Question::new(text) {
            Some(question) => self.answer(&question).await.map(Some),
            None => Ok(None),
        }
    }

    /// Ingests the corpus on first use; a no-op once policies are stored.
    pub async fn ensure_policies(
        &self,
        corpus_dir: &Path,
    ) -> Result<IngestionOutcome, AssistantError> {
        self.ingestor.ensure_ingested(corpus_dir).await
    }

    pub async fn status(&self) -> Result<StoreStatus, AssistantError> {
        Ok(StoreStatus {
            policy_chunks: self.store.count(Collection::Policies).await?,
            memory_entries: self.store.count(Collection::Memory).await?,
            ingestion: self.store.ingestion_state().await?,
            embedding_model: self.embedding_model.clone(),
            generation_model: self.generation_model.clone(),
        })
    }

    /// Empties a collection and returns how many records it held.
    ///
    /// Resetting policies also resets the ingestion marker, so the next
    /// [`ensure_policies`](Self::ensure_policies) re-ingests the corpus.
    pub async fn reset(&self, collection: Collection) -> Result<usize, AssistantError> {
        let removed = self.store.count(collection).await?;
        self.store.clear(collection).await?;
        info!(collection = %collection, removed, "Collection reset");
        Ok(removed)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn suggested_questions(&self) -> &'static [&'static str] {
        &SUGGESTED_QUESTIONS
    }
}

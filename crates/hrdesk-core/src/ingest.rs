//! One-time ingestion of the policy corpus.
//!
//! Ingestion is guarded by the store's ingestion marker: exactly one
//! process claims it, embeds every chunk, and marks it complete. Any
//! failure releases the claim and removes the partial chunks, so the next
//! start retries from scratch.

use crate::config::DEFAULT_STALE_INGESTION;
use crate::corpus::CorpusLoader;
use crate::embedding::EmbeddingProvider;
use crate::error::AssistantError;
use crate::metrics::AssistantMetrics;
use crate::retry::RetryPolicy;
use crate::storage::{
    get_current_timestamp, Collection, IngestionClaim, NewRecord, RecordMetadata, VectorStore,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// What [`PolicyIngestor::ensure_ingested`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// This call ingested the corpus.
    Ingested {
        chunks: usize,
        files: usize,
        /// An abandoned earlier attempt was taken over.
        reclaimed: bool,
    },
    /// Policies were already present; nothing was read.
    AlreadyComplete { chunks: usize },
    /// Another process is ingesting right now.
    InProgressElsewhere { started_at: u64 },
}

/// Embeds the corpus into the policy collection.
pub struct PolicyIngestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
    stale_after: Duration,
    metrics: AssistantMetrics,
}

impl PolicyIngestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        metrics: AssistantMetrics,
    ) -> Self {
        Self {
            embedder,
            store,
            retry: RetryPolicy::default(),
            stale_after: DEFAULT_STALE_INGESTION,
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Claims older than this are treated as abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Ingests `corpus_dir` unless policies were already ingested.
    ///
    /// Running this twice against a populated store leaves the chunk count
    /// unchanged. The corpus directory is only opened once the claim is
    /// won.
    #[instrument(skip_all, fields(corpus_dir = %corpus_dir.display()))]
    pub async fn ensure_ingested(
        &self,
        corpus_dir: &Path,
    ) -> Result<IngestionOutcome, AssistantError> {
        let claim = self
            .store
            .claim_ingestion(get_current_timestamp(), self.stale_after.as_secs())
            .await?;

        let reclaimed = match claim {
            IngestionClaim::AlreadyComplete { chunk_count } => {
                info!(chunks = chunk_count, "Policies already ingested");
                return Ok(IngestionOutcome::AlreadyComplete {
                    chunks: chunk_count,
                });
            }
            IngestionClaim::HeldElsewhere { started_at } => {
                warn!(started_at, "Policy ingestion already in progress elsewhere");
                return Ok(IngestionOutcome::InProgressElsewhere { started_at });
            }
            IngestionClaim::Claimed { reclaimed } => reclaimed,
        };

        if reclaimed {
            warn!("Reclaimed a stale ingestion claim; partial chunks were removed");
        }

        let started = Instant::now();
        match self.ingest_corpus(corpus_dir).await {
            Ok((chunks, files)) => {
                self.store
                    .complete_ingestion(chunks, get_current_timestamp())
                    .await?;
                let elapsed = started.elapsed();
                self.metrics.record_ingestion(chunks, elapsed);
                info!(
                    chunks,
                    files,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Policy ingestion complete"
                );
                Ok(IngestionOutcome::Ingested {
                    chunks,
                    files,
                    reclaimed,
                })
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Policy ingestion failed, releasing claim");
                if let Err(release_err) = self.store.release_ingestion().await {
                    warn!(error = %release_err, "Failed to release ingestion claim");
                }
                Err(e)
            }
        }
    }

    /// Returns `(chunks stored, files that contributed chunks)`.
    async fn ingest_corpus(&self, corpus_dir: &Path) -> Result<(usize, usize), AssistantError> {
        let corpus = CorpusLoader::open(corpus_dir)?;
        let mut stored = 0;
        let mut files = BTreeSet::new();

        for chunk in corpus.chunks() {
            let chunk = chunk?;
            let embedding = self
                .retry
                .call("embed", || self.embedder.embed(&chunk.text))
                .await?;

            let record = NewRecord::new(chunk.text, embedding).with_metadata(RecordMetadata {
                source_file: Some(chunk.source_file.clone()),
                ..Default::default()
            });
            self.store.insert(Collection::Policies, record).await?;

            files.insert(chunk.source_file);
            stored += 1;
        }

        Ok((stored, files.len()))
    }
}

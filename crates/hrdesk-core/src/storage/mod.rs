//! Vector storage for policy chunks and answered questions.
//!
//! A [`VectorStore`] holds two named collections ([`Collection::Policies`]
//! and [`Collection::Memory`]) of text records with embeddings, answers
//! exact nearest-neighbor queries, and owns the marker that makes policy
//! ingestion a one-time operation.
//!
//! # Implementations
//!
//! - [`InMemoryVectorStore`] - Process-local store for tests and ephemeral runs
//! - [`RedbVectorStore`] - Persistent store backed by redb (feature `redb-store`)
//!
//! Both backends do an exhaustive scan per query. Corpora here are a few
//! hundred sentences, and the memory threshold needs exact distances.

mod memory_store;
mod types;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use memory_store::InMemoryVectorStore;
pub use types::{
    get_current_timestamp, rank_by_distance, Collection, DistanceMetric, IngestionClaim,
    IngestionState, InsertOutcome, NewRecord, PruneRule, QueryFilter, QueryMatch, RecordId,
    RecordMetadata, StoredRecord,
};

#[cfg(feature = "redb-store")]
pub use redb_store::RedbVectorStore;

use thiserror::Error;

/// Errors from vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error (creating the data directory, etc.)
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error (redb, poisoned lock)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Embedding length does not match the store
    #[error("Embedding dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Store was created with a different distance metric
    #[error("Distance metric mismatch: store uses {stored}, requested {requested}")]
    MetricMismatch {
        stored: DistanceMetric,
        requested: DistanceMetric,
    },
}

/// Persistent nearest-neighbor store with a one-time ingestion marker.
///
/// Every operation is self-contained and atomic: a failed insert leaves
/// no partial record, and concurrent inserts never allocate the same id.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Embedding length every record must have.
    fn dimension(&self) -> usize;

    /// Metric used by [`query`](Self::query).
    fn metric(&self) -> DistanceMetric;

    /// Inserts a record and allocates its id.
    ///
    /// When `record.dedup_key` matches an existing record in the same
    /// collection, nothing is written and the existing id is returned with
    /// `created == false`.
    #[must_use = "Store insert failures should be handled"]
    async fn insert(
        &self,
        collection: Collection,
        record: NewRecord,
    ) -> Result<InsertOutcome, StoreError>;

    /// Retrieves a record by id. Returns `Ok(None)` if it doesn't exist.
    async fn get(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// Number of records in a collection.
    async fn count(&self, collection: Collection) -> Result<usize, StoreError>;

    /// Returns up to `top_k` records closest to `embedding`, closest first.
    ///
    /// An empty collection yields an empty vector, not an error.
    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    /// Deletes records selected by `rule`, returning how many were removed.
    async fn prune(&self, collection: Collection, rule: &PruneRule) -> Result<usize, StoreError>;

    /// Removes every record of a collection.
    ///
    /// Clearing [`Collection::Policies`] also resets the ingestion marker so
    /// the next start re-ingests the corpus.
    async fn clear(&self, collection: Collection) -> Result<(), StoreError>;

    /// Current ingestion marker.
    async fn ingestion_state(&self) -> Result<IngestionState, StoreError>;

    /// Atomically claims policy ingestion.
    ///
    /// Exactly one caller gets [`IngestionClaim::Claimed`] for a given
    /// store. A claim older than `stale_after_secs` is taken over and the
    /// partial chunks it left behind are removed.
    async fn claim_ingestion(
        &self,
        now: u64,
        stale_after_secs: u64,
    ) -> Result<IngestionClaim, StoreError>;

    /// Marks the claimed ingestion as finished.
    async fn complete_ingestion(&self, chunk_count: usize, now: u64) -> Result<(), StoreError>;

    /// Abandons a claim: drops partial policy chunks and resets the marker.
    async fn release_ingestion(&self) -> Result<(), StoreError>;
}

/// Checks an embedding against the store dimension.
pub(crate) fn check_dimension(expected: usize, embedding: &[f32]) -> Result<(), StoreError> {
    if embedding.len() != expected {
        return Err(StoreError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

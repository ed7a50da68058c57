//! Record, query and ingestion-marker types shared by all store backends.

use crate::config::{MEMORY_COLLECTION, POLICY_COLLECTION};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns the current Unix timestamp (seconds since UNIX_EPOCH).
///
/// If the system time is before UNIX_EPOCH (extremely unlikely),
/// returns 0 instead of panicking.
pub fn get_current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The two named collections the assistant persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Sentence-like chunks of the HR policy corpus (`hr_policies`).
    Policies,
    /// Previously answered questions (`qa_memory`).
    Memory,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Policies, Collection::Memory];

    /// Collection name as persisted by the store.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Policies => POLICY_COLLECTION,
            Collection::Memory => MEMORY_COLLECTION,
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Collection::Policies => "policy",
            Collection::Memory => "mem",
        }
    }

    /// Human-readable record id, e.g. `policy_3` or `mem_12`.
    pub fn label(&self, id: RecordId) -> String {
        format!("{}_{}", self.id_prefix(), id.as_u64())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a record, unique within its collection.
///
/// Ids are allocated by the store from a per-collection counter, so they
/// grow monotonically in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Optional metadata stored alongside a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Corpus file a policy chunk was cut from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Question a memory entry answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Cascade stage that produced a memory entry (`policy` or `llm`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// A record to be inserted. The store assigns its id.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
    /// Inserting a second record with the same key returns the first one.
    pub dedup_key: Option<String>,
}

impl NewRecord {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
            metadata: RecordMetadata::default(),
            dedup_key: None,
        }
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// A persisted record (embedding kept separately).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub text: String,
    #[serde(default)]
    pub metadata: RecordMetadata,
    /// Unix timestamp (seconds) of insertion
    pub created_at: u64,
}

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: RecordId,
    /// False when the dedup key matched an existing record.
    pub created: bool,
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub record: StoredRecord,
    /// Distance under the store's [`DistanceMetric`]; smaller is closer.
    pub distance: f32,
}

/// Restricts which records a query may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Only records inserted at or after this Unix timestamp.
    pub created_at_or_after: Option<u64>,
}

impl QueryFilter {
    pub fn accepts(&self, record: &StoredRecord) -> bool {
        self.created_at_or_after
            .map_or(true, |cutoff| record.created_at >= cutoff)
    }
}

/// Which records [`VectorStore::prune`](super::VectorStore::prune) removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneRule {
    /// Keep only the newest `n` records.
    pub keep_newest: Option<usize>,
    /// Remove records inserted before this Unix timestamp.
    pub created_before: Option<u64>,
}

impl PruneRule {
    pub fn is_noop(&self) -> bool {
        self.keep_newest.is_none() && self.created_before.is_none()
    }

    /// Selects the ids to delete from `(id, created_at)` pairs.
    pub fn select(&self, records: &[(RecordId, u64)]) -> Vec<RecordId> {
        let mut sorted: Vec<(RecordId, u64)> = records.to_vec();
        sorted.sort_by_key(|(id, _)| *id);

        let overflow = self
            .keep_newest
            .map_or(0, |keep| sorted.len().saturating_sub(keep));

        sorted
            .iter()
            .enumerate()
            .filter(|(index, (_, created_at))| {
                *index < overflow
                    || self
                        .created_before
                        .map_or(false, |cutoff| *created_at < cutoff)
            })
            .map(|(_, (id, _))| *id)
            .collect()
    }
}

/// Distance function used for nearest-neighbor queries.
///
/// The metric is fixed when a store is created and recorded with it, so
/// the memory threshold always means the same thing for a given store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    SquaredEuclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
                let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

                if mag_a == 0.0 || mag_b == 0.0 {
                    return 2.0; // Maximum distance for zero vectors
                }

                // Clamp away float drift so identical vectors land on 0.0
                (1.0 - dot / (mag_a * mag_b)).clamp(0.0, 2.0)
            }
            DistanceMetric::SquaredEuclidean => a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| (x - y) * (x - y))
                .sum(),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => f.write_str("cosine"),
            DistanceMetric::SquaredEuclidean => f.write_str("squared_euclidean"),
        }
    }
}

/// Orders `(id, distance)` candidates closest first; ties go to the older record.
pub fn rank_by_distance(candidates: &mut [(RecordId, f32)]) {
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

/// Persisted state of the one-time policy ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestionState {
    #[default]
    NotStarted,
    InProgress {
        started_at: u64,
    },
    Complete {
        chunk_count: usize,
        completed_at: u64,
    },
}

/// Outcome of trying to claim the ingestion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionClaim {
    /// Caller now owns ingestion. `reclaimed` is set when an abandoned
    /// claim was taken over and its partial chunks wiped.
    Claimed { reclaimed: bool },
    /// Policies were already ingested.
    AlreadyComplete { chunk_count: usize },
    /// Another live ingestion holds the marker.
    HeldElsewhere { started_at: u64 },
}

/// What a backend must do to resolve a claim, decided from the current marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimDecision {
    /// Write `InProgress`; wipe existing policy chunks first if set.
    Claim { wipe_partial: bool },
    /// Policies exist without a marker (store populated before markers
    /// existed); record them as complete.
    AdoptExisting { chunk_count: usize },
    AlreadyComplete { chunk_count: usize },
    HeldElsewhere { started_at: u64 },
}

impl ClaimDecision {
    pub(crate) fn decide(
        state: IngestionState,
        policy_count: usize,
        now: u64,
        stale_after_secs: u64,
    ) -> Self {
        match state {
            IngestionState::Complete { chunk_count, .. } => {
                ClaimDecision::AlreadyComplete { chunk_count }
            }
            IngestionState::NotStarted if policy_count > 0 => ClaimDecision::AdoptExisting {
                chunk_count: policy_count,
            },
            IngestionState::NotStarted => ClaimDecision::Claim {
                wipe_partial: false,
            },
            IngestionState::InProgress { started_at }
                if now.saturating_sub(started_at) >= stale_after_secs =>
            {
                ClaimDecision::Claim { wipe_partial: true }
            }
            IngestionState::InProgress { started_at } => {
                ClaimDecision::HeldElsewhere { started_at }
            }
        }
    }

    pub(crate) fn into_claim(self) -> IngestionClaim {
        match self {
            ClaimDecision::Claim { wipe_partial } => IngestionClaim::Claimed {
                reclaimed: wipe_partial,
            },
            ClaimDecision::AdoptExisting { chunk_count }
            | ClaimDecision::AlreadyComplete { chunk_count } => {
                IngestionClaim::AlreadyComplete { chunk_count }
            }
            ClaimDecision::HeldElsewhere { started_at } => {
                IngestionClaim::HeldElsewhere { started_at }
            }
        }
    }
}

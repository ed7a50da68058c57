//! Redb-backed vector store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database. Every trait operation runs in one transaction,
//! which is what makes id allocation and the ingestion claim atomic.
//!
//! # Tables
//!
//! Per collection (`hr_policies`, `qa_memory`):
//! - `<name>`: RecordId (u64) -> StoredRecord (JSON)
//! - `<name>_embeddings`: RecordId (u64) -> `Vec<f32>` (raw bytes, little-endian)
//! - `<name>_dedup`: dedup key (string) -> RecordId (u64)
//!
//! Shared:
//! - `metadata`: key (string) -> value (JSON). Holds the ingestion marker,
//!   per-collection id sequences, and the dimension and metric the store
//!   was created with.

use super::types::{
    get_current_timestamp, rank_by_distance, ClaimDecision, Collection, DistanceMetric,
    IngestionClaim, IngestionState, InsertOutcome, NewRecord, PruneRule, QueryFilter, QueryMatch,
    RecordId, StoredRecord,
};
use super::{check_dimension, StoreError, VectorStore};
use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const POLICY_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("hr_policies");
const POLICY_EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("hr_policies_embeddings");
const POLICY_DEDUP: TableDefinition<&str, u64> = TableDefinition::new("hr_policies_dedup");

const MEMORY_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("qa_memory");
const MEMORY_EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("qa_memory_embeddings");
const MEMORY_DEDUP: TableDefinition<&str, u64> = TableDefinition::new("qa_memory_dedup");

const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

// Metadata keys
const INGESTION_KEY: &str = "ingestion";
const DIMENSION_KEY: &str = "dimension";
const METRIC_KEY: &str = "metric";

#[derive(Clone, Copy)]
struct CollectionTables {
    records: TableDefinition<'static, u64, &'static [u8]>,
    embeddings: TableDefinition<'static, u64, &'static [u8]>,
    dedup: TableDefinition<'static, &'static str, u64>,
}

fn tables(collection: Collection) -> CollectionTables {
    match collection {
        Collection::Policies => CollectionTables {
            records: POLICY_RECORDS,
            embeddings: POLICY_EMBEDDINGS,
            dedup: POLICY_DEDUP,
        },
        Collection::Memory => CollectionTables {
            records: MEMORY_RECORDS,
            embeddings: MEMORY_EMBEDDINGS,
            dedup: MEMORY_DEDUP,
        },
    }
}

fn sequence_key(collection: Collection) -> String {
    format!("seq:{}", collection.name())
}

fn db_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::DatabaseError(format!("{}: {}", context, e))
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value)
        .map_err(|e| StoreError::SerializationError(format!("Failed to serialize: {}", e)))
}

fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::SerializationError(format!("Failed to deserialize: {}", e)))
}

/// Reads a JSON value from the metadata table.
fn read_meta<T, Tbl>(table: &Tbl, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(db_err("Failed to read metadata"))? {
        Some(guard) => from_json(guard.value()).map(Some),
        None => Ok(None),
    }
}

/// Serializes an embedding to raw bytes.
///
/// Format: Little-endian f32 values packed sequentially (4 bytes per value).
/// Endianness MUST match `deserialize_embedding()`.
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Redb-backed [`VectorStore`] for native platforms.
///
/// # Example
///
/// ```ignore
/// use hrdesk_core::storage::{DistanceMetric, RedbVectorStore};
///
/// let store = RedbVectorStore::open("./data/hrdesk.redb", 384, DistanceMetric::Cosine)?;
/// ```
pub struct RedbVectorStore {
    db: Arc<Database>,
    dimension: usize,
    metric: DistanceMetric,
}

impl RedbVectorStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// A new store records `dimension` and `metric`. Reopening an existing
    /// store with different values fails instead of silently mixing
    /// incompatible distances.
    pub fn open<P: AsRef<Path>>(
        path: P,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::IoError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::create(path).map_err(db_err("Failed to open database"))?;

        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            for collection in Collection::ALL {
                let t = tables(collection);
                write_txn
                    .open_table(t.records)
                    .map_err(db_err("Failed to create records table"))?;
                write_txn
                    .open_table(t.embeddings)
                    .map_err(db_err("Failed to create embeddings table"))?;
                write_txn
                    .open_table(t.dedup)
                    .map_err(db_err("Failed to create dedup table"))?;
            }

            let mut meta = write_txn
                .open_table(METADATA_TABLE)
                .map_err(db_err("Failed to create metadata table"))?;

            match read_meta::<usize, _>(&meta, DIMENSION_KEY)? {
                Some(stored) if stored != dimension => {
                    return Err(StoreError::DimensionMismatch {
                        expected: stored,
                        actual: dimension,
                    });
                }
                Some(_) => {}
                None => {
                    meta.insert(DIMENSION_KEY, to_json(&dimension)?.as_slice())
                        .map_err(db_err("Failed to write dimension"))?;
                }
            }

            match read_meta::<DistanceMetric, _>(&meta, METRIC_KEY)? {
                Some(stored) if stored != metric => {
                    return Err(StoreError::MetricMismatch {
                        stored,
                        requested: metric,
                    });
                }
                Some(_) => {}
                None => {
                    meta.insert(METRIC_KEY, to_json(&metric)?.as_slice())
                        .map_err(db_err("Failed to write metric"))?;
                }
            }
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit table creation"))?;

        info!(path = %path.display(), dimension, %metric, "Opened vector store");

        Ok(Self {
            db: Arc::new(db),
            dimension,
            metric,
        })
    }

    /// Drops and recreates a collection's tables and restarts its id sequence.
    fn wipe_collection(write_txn: &WriteTransaction, collection: Collection) -> Result<(), StoreError> {
        let t = tables(collection);
        write_txn
            .delete_table(t.records)
            .map_err(db_err("Failed to delete records table"))?;
        write_txn
            .delete_table(t.embeddings)
            .map_err(db_err("Failed to delete embeddings table"))?;
        write_txn
            .delete_table(t.dedup)
            .map_err(db_err("Failed to delete dedup table"))?;

        write_txn
            .open_table(t.records)
            .map_err(db_err("Failed to recreate records table"))?;
        write_txn
            .open_table(t.embeddings)
            .map_err(db_err("Failed to recreate embeddings table"))?;
        write_txn
            .open_table(t.dedup)
            .map_err(db_err("Failed to recreate dedup table"))?;

        let mut meta = write_txn
            .open_table(METADATA_TABLE)
            .map_err(db_err("Failed to open metadata table"))?;
        meta.remove(sequence_key(collection).as_str())
            .map_err(db_err("Failed to reset id sequence"))?;
        Ok(())
    }

    fn write_ingestion(
        write_txn: &WriteTransaction,
        state: &IngestionState,
    ) -> Result<(), StoreError> {
        let mut meta = write_txn
            .open_table(METADATA_TABLE)
            .map_err(db_err("Failed to open metadata table"))?;
        meta.insert(INGESTION_KEY, to_json(state)?.as_slice())
            .map_err(db_err("Failed to write ingestion marker"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for RedbVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn insert(
        &self,
        collection: Collection,
        record: NewRecord,
    ) -> Result<InsertOutcome, StoreError> {
        check_dimension(self.dimension, &record.embedding)?;
        let t = tables(collection);

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        let id = {
            let mut dedup = write_txn
                .open_table(t.dedup)
                .map_err(db_err("Failed to open dedup table"))?;

            if let Some(key) = record.dedup_key.as_deref() {
                let existing = dedup
                    .get(key)
                    .map_err(db_err("Failed to read dedup table"))?
                    .map(|guard| guard.value());
                if let Some(existing) = existing {
                    debug!(collection = %collection, id = existing, "Dedup hit, skipping insert");
                    return Ok(InsertOutcome {
                        id: RecordId::from_u64(existing),
                        created: false,
                    });
                }
            }

            let mut meta = write_txn
                .open_table(METADATA_TABLE)
                .map_err(db_err("Failed to open metadata table"))?;
            let seq_key = sequence_key(collection);
            let id: u64 = read_meta(&meta, &seq_key)?.unwrap_or(0);
            meta.insert(seq_key.as_str(), to_json(&(id + 1))?.as_slice())
                .map_err(db_err("Failed to advance id sequence"))?;

            let stored = StoredRecord {
                id: RecordId::from_u64(id),
                text: record.text,
                metadata: record.metadata,
                created_at: get_current_timestamp(),
            };

            let mut records = write_txn
                .open_table(t.records)
                .map_err(db_err("Failed to open records table"))?;
            records
                .insert(id, to_json(&stored)?.as_slice())
                .map_err(db_err("Failed to insert record"))?;

            let mut embeddings = write_txn
                .open_table(t.embeddings)
                .map_err(db_err("Failed to open embeddings table"))?;
            embeddings
                .insert(id, serialize_embedding(&record.embedding).as_slice())
                .map_err(db_err("Failed to insert embedding"))?;

            if let Some(key) = record.dedup_key.as_deref() {
                dedup
                    .insert(key, id)
                    .map_err(db_err("Failed to insert dedup key"))?;
            }
            id
        };

        write_txn
            .commit()
            .map_err(db_err("Failed to commit record"))?;

        Ok(InsertOutcome {
            id: RecordId::from_u64(id),
            created: true,
        })
    }

    async fn get(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(tables(collection).records)
            .map_err(db_err("Failed to open records table"))?;

        match table
            .get(id.as_u64())
            .map_err(db_err("Failed to get record"))?
        {
            Some(guard) => from_json(guard.value()).map(Some),
            None => Ok(None),
        }
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(tables(collection).records)
            .map_err(db_err("Failed to open records table"))?;
        let len = table.len().map_err(db_err("Failed to count records"))?;
        Ok(len as usize)
    }

    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        check_dimension(self.dimension, embedding)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let t = tables(collection);
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let embeddings = read_txn
            .open_table(t.embeddings)
            .map_err(db_err("Failed to open embeddings table"))?;
        let records = read_txn
            .open_table(t.records)
            .map_err(db_err("Failed to open records table"))?;

        let mut candidates = Vec::new();
        for entry in embeddings
            .iter()
            .map_err(db_err("Failed to iterate embeddings"))?
        {
            let (key, value) = entry.map_err(db_err("Failed to read embedding entry"))?;
            let stored = deserialize_embedding(value.value());
            candidates.push((
                RecordId::from_u64(key.value()),
                self.metric.distance(embedding, &stored),
            ));
        }
        rank_by_distance(&mut candidates);

        let mut matches = Vec::with_capacity(top_k.min(candidates.len()));
        for (id, distance) in candidates {
            if matches.len() == top_k {
                break;
            }
            let Some(guard) = records
                .get(id.as_u64())
                .map_err(db_err("Failed to get record"))?
            else {
                continue;
            };
            let record: StoredRecord = from_json(guard.value())?;
            if filter.accepts(&record) {
                matches.push(QueryMatch { record, distance });
            }
        }

        Ok(matches)
    }

    async fn prune(&self, collection: Collection, rule: &PruneRule) -> Result<usize, StoreError> {
        if rule.is_noop() {
            return Ok(0);
        }
        let t = tables(collection);

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        let removed = {
            let mut records = write_txn
                .open_table(t.records)
                .map_err(db_err("Failed to open records table"))?;

            let mut entries = Vec::new();
            for entry in records.iter().map_err(db_err("Failed to iterate records"))? {
                let (_, value) = entry.map_err(db_err("Failed to read record entry"))?;
                let record: StoredRecord = from_json(value.value())?;
                entries.push((record.id, record.created_at));
            }

            let doomed = rule.select(&entries);
            if doomed.is_empty() {
                return Ok(0);
            }

            let mut embeddings = write_txn
                .open_table(t.embeddings)
                .map_err(db_err("Failed to open embeddings table"))?;
            for id in &doomed {
                records
                    .remove(id.as_u64())
                    .map_err(db_err("Failed to delete record"))?;
                embeddings
                    .remove(id.as_u64())
                    .map_err(db_err("Failed to delete embedding"))?;
            }

            let doomed_set: HashSet<u64> = doomed.iter().map(|id| id.as_u64()).collect();
            let mut dedup = write_txn
                .open_table(t.dedup)
                .map_err(db_err("Failed to open dedup table"))?;
            let mut stale_keys = Vec::new();
            for entry in dedup.iter().map_err(db_err("Failed to iterate dedup table"))? {
                let (key, value) = entry.map_err(db_err("Failed to read dedup entry"))?;
                if doomed_set.contains(&value.value()) {
                    stale_keys.push(key.value().to_string());
                }
            }
            for key in &stale_keys {
                dedup
                    .remove(key.as_str())
                    .map_err(db_err("Failed to delete dedup key"))?;
            }

            doomed.len()
        };

        write_txn
            .commit()
            .map_err(db_err("Failed to commit prune"))?;

        debug!(collection = %collection, removed, "Pruned records");
        Ok(removed)
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        Self::wipe_collection(&write_txn, collection)?;
        if collection == Collection::Policies {
            Self::write_ingestion(&write_txn, &IngestionState::NotStarted)?;
        }

        write_txn
            .commit()
            .map_err(db_err("Failed to commit clear"))?;

        info!(collection = %collection, "Cleared collection");
        Ok(())
    }

    async fn ingestion_state(&self) -> Result<IngestionState, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let meta = read_txn
            .open_table(METADATA_TABLE)
            .map_err(db_err("Failed to open metadata table"))?;
        Ok(read_meta(&meta, INGESTION_KEY)?.unwrap_or_default())
    }

    async fn claim_ingestion(
        &self,
        now: u64,
        stale_after_secs: u64,
    ) -> Result<IngestionClaim, StoreError> {
        // Writers are serialized by redb, so the read-decide-write below is
        // a compare-and-set on the marker.
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        let (state, policy_count) = {
            let meta = write_txn
                .open_table(METADATA_TABLE)
                .map_err(db_err("Failed to open metadata table"))?;
            let state: IngestionState = read_meta(&meta, INGESTION_KEY)?.unwrap_or_default();
            let records = write_txn
                .open_table(POLICY_RECORDS)
                .map_err(db_err("Failed to open records table"))?;
            let count = records.len().map_err(db_err("Failed to count records"))?;
            (state, count as usize)
        };

        let decision = ClaimDecision::decide(state, policy_count, now, stale_after_secs);
        match decision {
            ClaimDecision::Claim { wipe_partial } => {
                if wipe_partial {
                    Self::wipe_collection(&write_txn, Collection::Policies)?;
                }
                Self::write_ingestion(&write_txn, &IngestionState::InProgress { started_at: now })?;
            }
            ClaimDecision::AdoptExisting { chunk_count } => {
                Self::write_ingestion(
                    &write_txn,
                    &IngestionState::Complete {
                        chunk_count,
                        completed_at: now,
                    },
                )?;
            }
            ClaimDecision::AlreadyComplete { .. } | ClaimDecision::HeldElsewhere { .. } => {}
        }

        write_txn
            .commit()
            .map_err(db_err("Failed to commit ingestion claim"))?;

        Ok(decision.into_claim())
    }

    async fn complete_ingestion(&self, chunk_count: usize, now: u64) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        Self::write_ingestion(
            &write_txn,
            &IngestionState::Complete {
                chunk_count,
                completed_at: now,
            },
        )?;
        write_txn
            .commit()
            .map_err(db_err("Failed to commit ingestion marker"))?;
        Ok(())
    }

    async fn release_ingestion(&self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        Self::wipe_collection(&write_txn, Collection::Policies)?;
        Self::write_ingestion(&write_txn, &IngestionState::NotStarted)?;
        write_txn
            .commit()
            .map_err(db_err("Failed to commit ingestion release"))?;
        Ok(())
    }
}

//! Process-local vector store.

use super::types::{
    get_current_timestamp, rank_by_distance, ClaimDecision, Collection, DistanceMetric,
    IngestionClaim, IngestionState, InsertOutcome, NewRecord, PruneRule, QueryFilter, QueryMatch,
    RecordId, StoredRecord,
};
use super::{check_dimension, StoreError, VectorStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct CollectionData {
    next_id: u64,
    records: BTreeMap<u64, (StoredRecord, Vec<f32>)>,
    dedup: HashMap<String, u64>,
}

impl CollectionData {
    fn remove(&mut self, id: u64) {
        self.records.remove(&id);
        self.dedup.retain(|_, existing| *existing != id);
    }
}

#[derive(Default)]
struct Inner {
    policies: CollectionData,
    memory: CollectionData,
    ingestion: IngestionState,
}

impl Inner {
    fn collection(&self, collection: Collection) -> &CollectionData {
        match collection {
            Collection::Policies => &self.policies,
            Collection::Memory => &self.memory,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut CollectionData {
        match collection {
            Collection::Policies => &mut self.policies,
            Collection::Memory => &mut self.memory,
        }
    }
}

/// In-memory [`VectorStore`]. Nothing survives the process.
///
/// A single lock guards both collections and the ingestion marker, so
/// every operation is atomic with respect to the others.
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    /// Creates an empty store using cosine distance.
    pub fn new(dimension: usize) -> Self {
        Self::with_metric(dimension, DistanceMetric::Cosine)
    }

    pub fn with_metric(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
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

        let mut inner = self.write()?;
        let data = inner.collection_mut(collection);

        if let Some(existing) = record
            .dedup_key
            .as_ref()
            .and_then(|key| data.dedup.get(key))
        {
            return Ok(InsertOutcome {
                id: RecordId::from_u64(*existing),
                created: false,
            });
        }

        let id = data.next_id;
        data.next_id += 1;

        let stored = StoredRecord {
            id: RecordId::from_u64(id),
            text: record.text,
            metadata: record.metadata,
            created_at: get_current_timestamp(),
        };
        data.records.insert(id, (stored, record.embedding));
        if let Some(key) = record.dedup_key {
            data.dedup.insert(key, id);
        }

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
        let inner = self.read()?;
        Ok(inner
            .collection(collection)
            .records
            .get(&id.as_u64())
            .map(|(record, _)| record.clone()))
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        Ok(self.read()?.collection(collection).records.len())
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

        let inner = self.read()?;
        let data = inner.collection(collection);

        let mut candidates: Vec<(RecordId, f32)> = data
            .records
            .values()
            .filter(|(record, _)| filter.accepts(record))
            .map(|(record, stored)| (record.id, self.metric.distance(embedding, stored)))
            .collect();
        rank_by_distance(&mut candidates);

        Ok(candidates
            .into_iter()
            .take(top_k)
            .filter_map(|(id, distance)| {
                data.records.get(&id.as_u64()).map(|(record, _)| QueryMatch {
                    record: record.clone(),
                    distance,
                })
            })
            .collect())
    }

    async fn prune(&self, collection: Collection, rule: &PruneRule) -> Result<usize, StoreError> {
        if rule.is_noop() {
            return Ok(0);
        }
        let mut inner = self.write()?;
        let data = inner.collection_mut(collection);

        let entries: Vec<(RecordId, u64)> = data
            .records
            .values()
            .map(|(record, _)| (record.id, record.created_at))
            .collect();
        let doomed = rule.select(&entries);
        for id in &doomed {
            data.remove(id.as_u64());
        }
        Ok(doomed.len())
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        *inner.collection_mut(collection) = CollectionData::default();
        if collection == Collection::Policies {
            inner.ingestion = IngestionState::NotStarted;
        }
        Ok(())
    }

    async fn ingestion_state(&self) -> Result<IngestionState, StoreError> {
        Ok(self.read()?.ingestion)
    }

    async fn claim_ingestion(
        &self,
        now: u64,
        stale_after_secs: u64,
    ) -> Result<IngestionClaim, StoreError> {
        let mut inner = self.write()?;
        let decision =
            ClaimDecision::decide(inner.ingestion, inner.policies.records.len(), now, stale_after_secs);

        match decision {
            ClaimDecision::Claim { wipe_partial } => {
                if wipe_partial {
                    inner.policies = CollectionData::default();
                }
                inner.ingestion = IngestionState::InProgress { started_at: now };
            }
            ClaimDecision::AdoptExisting { chunk_count } => {
                inner.ingestion = IngestionState::Complete {
                    chunk_count,
                    completed_at: now,
                };
            }
            ClaimDecision::AlreadyComplete { .. } | ClaimDecision::HeldElsewhere { .. } => {}
        }

        Ok(decision.into_claim())
    }

    async fn complete_ingestion(&self, chunk_count: usize, now: u64) -> Result<(), StoreError> {
        self.write()?.ingestion = IngestionState::Complete {
            chunk_count,
            completed_at: now,
        };
        Ok(())
    }

    async fn release_ingestion(&self) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.policies = CollectionData::default();
        inner.ingestion = IngestionState::NotStarted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordMetadata;
    use std::sync::Arc;

    fn record(text: &str, embedding: [f32; 3]) -> NewRecord {
        NewRecord::new(text, embedding.to_vec())
    }

    #[tokio::test]
    async fn test_empty_collection_query_is_empty() {
        let store = InMemoryVectorStore::new(3);
        let hits = store
            .query(Collection::Memory, &[1.0, 0.0, 0.0], 1, &QueryFilter::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.count(Collection::Memory).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let store = InMemoryVectorStore::new(3);
        store
            .insert(Collection::Policies, record("far", [0.0, 1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(Collection::Policies, record("near", [1.0, 0.1, 0.0]))
            .await
            .unwrap();

        let hits = store
            .query(Collection::Policies, &[1.0, 0.0, 0.0], 2, &QueryFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.text, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = InMemoryVectorStore::new(3);
        store
            .insert(Collection::Policies, record("policy", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(store.count(Collection::Policies).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Memory).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dedup_key_returns_existing_id() {
        let store = InMemoryVectorStore::new(3);
        let first = store
            .insert(
                Collection::Memory,
                record("answer", [1.0, 0.0, 0.0]).with_dedup_key("q\u{1f}answer"),
            )
            .await
            .unwrap();
        let second = store
            .insert(
                Collection::Memory,
                record("answer", [1.0, 0.0, 0.0]).with_dedup_key("q\u{1f}answer"),
            )
            .await
            .unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count(Collection::Memory).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new(3);
        let err = store
            .insert(Collection::Memory, NewRecord::new("x", vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_unique_ids() {
        let store = Arc::new(InMemoryVectorStore::new(3));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(
                        Collection::Memory,
                        NewRecord::new(format!("answer {i}"), vec![1.0, i as f32, 0.0]),
                    )
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn test_metadata_round_trips() {
        let store = InMemoryVectorStore::new(3);
        let metadata = RecordMetadata {
            question: Some("What is the notice period?".into()),
            origin: Some("policy".into()),
            ..Default::default()
        };
        let outcome = store
            .insert(
                Collection::Memory,
                record("Thirty days.", [0.0, 0.0, 1.0]).with_metadata(metadata.clone()),
            )
            .await
            .unwrap();
        let stored = store
            .get(Collection::Memory, outcome.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.metadata, metadata);
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let store = InMemoryVectorStore::new(3);
        for i in 0..4 {
            store
                .insert(
                    Collection::Memory,
                    NewRecord::new(format!("a{i}"), vec![1.0, 0.0, i as f32]),
                )
                .await
                .unwrap();
        }
        let removed = store
            .prune(
                Collection::Memory,
                &PruneRule {
                    keep_newest: Some(1),
                    created_before: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(removed, 3);
        let survivor = store
            .get(Collection::Memory, RecordId::from_u64(3))
            .await
            .unwrap();
        assert!(survivor.is_some());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_released() {
        let store = InMemoryVectorStore::new(3);
        let first = store.claim_ingestion(1000, 600).await.unwrap();
        assert_eq!(first, IngestionClaim::Claimed { reclaimed: false });

        let second = store.claim_ingestion(1001, 600).await.unwrap();
        assert_eq!(second, IngestionClaim::HeldElsewhere { started_at: 1000 });

        store
            .insert(Collection::Policies, record("partial", [1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store.release_ingestion().await.unwrap();
        assert_eq!(store.count(Collection::Policies).await.unwrap(), 0);
        assert_eq!(
            store.ingestion_state().await.unwrap(),
            IngestionState::NotStarted
        );
    }

    #[tokio::test]
    async fn test_stale_claim_wipes_partial_chunks() {
        let store = InMemoryVectorStore::new(3);
        store.claim_ingestion(100, 600).await.unwrap();
        store
            .insert(Collection::Policies, record("partial", [1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let claim = store.claim_ingestion(1000, 600).await.unwrap();
        assert_eq!(claim, IngestionClaim::Claimed { reclaimed: true });
        assert_eq!(store.count(Collection::Policies).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_policies_resets_marker() {
        let store = InMemoryVectorStore::new(3);
        store.claim_ingestion(1, 600).await.unwrap();
        store.complete_ingestion(0, 2).await.unwrap();
        store.clear(Collection::Policies).await.unwrap();
        assert_eq!(
            store.ingestion_state().await.unwrap(),
            IngestionState::NotStarted
        );
    }
}

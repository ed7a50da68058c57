//! End-to-end tests for ingestion and the answer cascade.
//!
//! These tests exercise the full workflow through [`Assistant`]:
//! 1. Ingestion: corpus directory → sentence chunks → embeddings → `hr_policies`
//! 2. Answering: question embedding → memory lookup → policy lookup →
//!    generation → `qa_memory`
//!
//! Providers are deterministic fakes, so no model files or network access
//! are needed. The one test that loads the real MiniLM model is ignored by
//! default: run it with
//! `HRDESK_MODEL_DIR=/path/to/all-MiniLM-L6-v2 cargo test -p hrdesk-core --test integration_tests -- --ignored`.

use async_trait::async_trait;
use hrdesk_core::embedding::EmbeddingProvider;
use hrdesk_core::error::{EmbeddingError, GenerationError};
use hrdesk_core::generation::Generator;
use hrdesk_core::storage::{InMemoryVectorStore, IngestionState, QueryFilter, RecordId};
use hrdesk_core::{
    AnswerSource, Assistant, AssistantConfig, Collection, IngestionOutcome, VectorStore,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const DIM: usize = 256;

// ============================================================================
// Fake Providers
// ============================================================================

/// Hashes each lowercase word into one of `DIM` buckets.
struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x100000001b3)
                });
            vector[(hash % DIM as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

/// Replies `grounded` to policy prompts and `fallback` to everything else.
struct CannedGenerator {
    grounded: String,
    fallback: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl CannedGenerator {
    fn new(grounded: &str, fallback: &str) -> Self {
        Self {
            grounded: grounded.to_string(),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for CannedGenerator {
    fn model_id(&self) -> &str {
        "canned"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Policy:") {
            Ok(self.grounded.clone())
        } else {
            Ok(self.fallback.clone())
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn write_corpus(dir: &Path) {
    std::fs::write(
        dir.join("01_leave.txt"),
        "Unused annual leave can be carried forward up to ten days. \
         Carry forward requests go to your manager before December.",
    )
    .unwrap();
    std::fs::write(
        dir.join("02_notice.txt"),
        "The notice period for permanent employees is thirty days. Short one.",
    )
    .unwrap();
    std::fs::write(
        dir.join("03_remote.txt"),
        "Employees may work from home two days in every week.",
    )
    .unwrap();
    // Not a corpus file
    std::fs::write(dir.join("README.md"), "This file is not ingested at all.").unwrap();
}

fn assistant_with(
    store: Arc<dyn VectorStore>,
    generator: Arc<CannedGenerator>,
) -> Assistant {
    Assistant::new(
        Arc::new(BagOfWordsEmbedder),
        generator,
        store,
        AssistantConfig::default(),
    )
    .unwrap()
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingestion_keeps_long_sentences_in_file_order() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let assistant = assistant_with(store.clone(), Arc::new(CannedGenerator::new("", "")));

    let outcome = assistant.ensure_policies(corpus.path()).await.unwrap();
    assert_eq!(
        outcome,
        IngestionOutcome::Ingested {
            chunks: 4,
            files: 3,
            reclaimed: false
        }
    );

    let mut texts = Vec::new();
    for id in 0..4 {
        let record = store
            .get(Collection::Policies, RecordId::from_u64(id))
            .await
            .unwrap()
            .unwrap();
        texts.push(record.text);
    }
    assert_eq!(
        texts,
        vec![
            "Unused annual leave can be carried forward up to ten days.",
            "Carry forward requests go to your manager before December.",
            "The notice period for permanent employees is thirty days.",
            "Employees may work from home two days in every week.",
        ]
    );
}

#[tokio::test]
async fn test_ingesting_twice_leaves_count_unchanged() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let assistant = assistant_with(store.clone(), Arc::new(CannedGenerator::new("", "")));

    assistant.ensure_policies(corpus.path()).await.unwrap();
    let before = store.count(Collection::Policies).await.unwrap();
    let second = assistant.ensure_policies(corpus.path()).await.unwrap();

    assert_eq!(second, IngestionOutcome::AlreadyComplete { chunks: before });
    assert_eq!(store.count(Collection::Policies).await.unwrap(), before);
}

#[tokio::test]
async fn test_missing_corpus_is_a_corpus_error() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let assistant = assistant_with(store, Arc::new(CannedGenerator::new("", "")));
    let err = assistant
        .ensure_policies(Path::new("/definitely/not/here"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "corpus");
}

// ============================================================================
// Answer Cascade
// ============================================================================

#[tokio::test]
async fn test_notice_period_is_answered_from_policy() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let generator = Arc::new(CannedGenerator::new(
        "The notice period is thirty days.",
        "unused",
    ));
    let assistant = assistant_with(store.clone(), generator.clone());
    assistant.ensure_policies(corpus.path()).await.unwrap();

    let answer = assistant
        .ask("What is the notice period?")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answer.source, AnswerSource::Policy);
    assert_eq!(answer.text, "The notice period is thirty days.");
    assert!(answer.persisted);

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("The notice period for permanent employees is thirty days."));
    assert!(prompt.contains("What is the notice period?"));

    let memory = store
        .get(Collection::Memory, RecordId::from_u64(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(memory.metadata.question.as_deref(), Some("What is the notice period?"));
    assert_eq!(memory.metadata.origin.as_deref(), Some("policy"));
}

#[tokio::test]
async fn test_memory_entry_is_retrieved_at_zero_distance() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let generator = Arc::new(CannedGenerator::new("unused", "Please contact HR."));
    let assistant = assistant_with(store.clone(), generator.clone());
    let question = "Who signs off on travel expenses?";

    let first = assistant.ask(question).await.unwrap().unwrap();
    assert_eq!(first.source, AnswerSource::Fallback);

    let embedding = BagOfWordsEmbedder.embed(question).await.unwrap();
    let matches = store
        .query(Collection::Memory, &embedding, 1, &QueryFilter::default())
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches[0].distance.abs() < 1e-5);
    assert_eq!(matches[0].record.text, "Please contact HR.");

    let second = assistant.ask(question).await.unwrap().unwrap();
    assert_eq!(second.source, AnswerSource::Memory);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_not_found_reply_falls_back_and_records_llm_origin() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let generator = Arc::new(CannedGenerator::new(
        "NOT_FOUND",
        "Most offices have a canteen.",
    ));
    let assistant = assistant_with(store.clone(), generator.clone());
    assistant.ensure_policies(corpus.path()).await.unwrap();

    let answer = assistant
        .ask("Is there a canteen in the office?")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answer.source, AnswerSource::Fallback);
    assert_eq!(generator.calls(), 2);

    let memory = store
        .get(Collection::Memory, RecordId::from_u64(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(memory.metadata.origin.as_deref(), Some("llm"));
}

#[tokio::test]
async fn test_concurrent_questions_get_distinct_memory_ids() {
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let assistant = Arc::new(assistant_with(
        store.clone(),
        Arc::new(CannedGenerator::new("unused", "Ask your manager.")),
    ));

    let questions = [
        "How do I update my bank details?",
        "Where do I find my payslip?",
        "Who approves overtime?",
        "Can I change my tax declaration?",
        "Is there a referral bonus?",
    ];
    let mut handles = Vec::new();
    for question in questions {
        let assistant = assistant.clone();
        handles.push(tokio::spawn(async move {
            assistant.ask(question).await.unwrap().unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().source, AnswerSource::Fallback);
    }

    assert_eq!(
        store.count(Collection::Memory).await.unwrap(),
        questions.len()
    );
    for id in 0..questions.len() as u64 {
        assert!(store
            .get(Collection::Memory, RecordId::from_u64(id))
            .await
            .unwrap()
            .is_some());
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[cfg(feature = "redb-store")]
#[tokio::test]
async fn test_redb_store_survives_restart() {
    use hrdesk_core::storage::{DistanceMetric, RedbVectorStore};

    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let data = TempDir::new().unwrap();
    let db_path = data.path().join("hrdesk.redb");

    {
        let store = Arc::new(RedbVectorStore::open(&db_path, DIM, DistanceMetric::Cosine).unwrap());
        let generator = Arc::new(CannedGenerator::new(
            "You can carry forward up to ten days.",
            "unused",
        ));
        let assistant = assistant_with(store, generator);
        assistant.ensure_policies(corpus.path()).await.unwrap();
        let answer = assistant
            .ask("Can leaves be carried forward?")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.source, AnswerSource::Policy);
    }

    let store = Arc::new(RedbVectorStore::open(&db_path, DIM, DistanceMetric::Cosine).unwrap());
    let generator = Arc::new(CannedGenerator::new("unused", "unused"));
    let assistant = assistant_with(store, generator.clone());

    let outcome = assistant.ensure_policies(corpus.path()).await.unwrap();
    assert_eq!(outcome, IngestionOutcome::AlreadyComplete { chunks: 4 });

    let answer = assistant
        .ask("Can leaves be carried forward?")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answer.source, AnswerSource::Memory);
    assert_eq!(answer.text, "You can carry forward up to ten days.");
    assert_eq!(generator.calls(), 0);

    let status = assistant.status().await.unwrap();
    assert_eq!(status.memory_entries, 1);
    assert!(matches!(
        status.ingestion,
        IngestionState::Complete { chunk_count: 4, .. }
    ));
}

// ============================================================================
// Local Model (requires downloaded weights)
// ============================================================================

#[cfg(feature = "local-embedding")]
#[tokio::test]
#[ignore = "needs all-MiniLM-L6-v2 files in HRDESK_MODEL_DIR"]
async fn test_minilm_ranks_related_sentence_first() {
    use hrdesk_core::embedding::LocalEmbeddingProvider;

    let model_dir = std::env::var("HRDESK_MODEL_DIR").expect("HRDESK_MODEL_DIR not set");
    let provider = LocalEmbeddingProvider::from_dir(Path::new(&model_dir)).unwrap();
    assert_eq!(provider.dimension(), 384);

    let store = InMemoryVectorStore::new(provider.dimension());
    for sentence in [
        "The notice period for permanent employees is thirty days.",
        "Employees may work from home two days in every week.",
    ] {
        let embedding = provider.embed(sentence).await.unwrap();
        store
            .insert(
                Collection::Policies,
                hrdesk_core::storage::NewRecord::new(sentence, embedding),
            )
            .await
            .unwrap();
    }

    let query = provider.embed("How long is my notice period?").await.unwrap();
    let matches = store
        .query(Collection::Policies, &query, 2, &QueryFilter::default())
        .await
        .unwrap();
    assert!(matches[0].record.text.contains("notice period"));
    assert!(matches[0].distance < matches[1].distance);
}

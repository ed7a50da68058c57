//! The answer cascade: memory, then policy-grounded generation, then a
//! general fallback.
//!
//! ```text
//! question ─ embed ─┬─ memory hit (distance < threshold) ──────────► memory
//!                   └─ nearest policy chunk ─┬─ grounded reply ─────► policy  ─┐
//!                                            └─ NOT_FOUND / none ──► fallback ─┴─ remember
//! ```
//!
//! Every run that doesn't hit memory writes one memory entry keyed by the
//! question's embedding, so asking the same thing again is answered from
//! memory without calling the generator.

mod prompts;
mod types;

pub use prompts::{fallback_prompt, grounded_prompt, is_not_found};
pub use types::{AnswerResult, AnswerSource, Question};

use crate::config::MEMORY_DISTANCE_THRESHOLD;
use crate::embedding::EmbeddingProvider;
use crate::error::AssistantError;
use crate::generation::Generator;
use crate::metrics::{AnswerTimings, AssistantMetrics};
use crate::retry::RetryPolicy;
use crate::storage::{
    get_current_timestamp, Collection, NewRecord, PruneRule, QueryFilter, RecordMetadata,
    VectorStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Growth limits for the `qa_memory` collection.
///
/// The default is unbounded: memory acts as a permanent FAQ cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    /// Keep at most this many entries; the oldest are evicted after each write.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Entries older than this are ignored by lookups and pruned on write.
    #[serde(default, with = "optional_secs")]
    pub ttl: Option<Duration>,
}

impl MemoryPolicy {
    /// Oldest creation timestamp still considered live.
    fn live_since(&self, now: u64) -> Option<u64> {
        self.ttl.map(|ttl| now.saturating_sub(ttl.as_secs()))
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

/// Tunables for [`AnswerCascade`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeSettings {
    /// Memory hits must be strictly closer than this.
    pub memory_threshold: f32,
    pub memory: MemoryPolicy,
    pub embed_retry: RetryPolicy,
    pub generate_retry: RetryPolicy,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            memory_threshold: MEMORY_DISTANCE_THRESHOLD,
            memory: MemoryPolicy::default(),
            embed_retry: RetryPolicy::default(),
            generate_retry: RetryPolicy::default(),
        }
    }
}

/// Key that makes a retried memory write a no-op.
fn memory_dedup_key(question: &str, answer: &str) -> String {
    format!("{}\u{1f}{}", question, answer)
}

/// Runs the cascade against shared providers and a shared store.
pub struct AnswerCascade {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    settings: CascadeSettings,
    metrics: AssistantMetrics,
}

impl AnswerCascade {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
        settings: CascadeSettings,
        metrics: AssistantMetrics,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    /// Answers one question.
    ///
    /// # Errors
    ///
    /// Provider failures (after retries) and store failures. A failed run
    /// writes nothing to memory.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn answer(&self, question: &Question) -> Result<AnswerResult, AssistantError> {
        let started = Instant::now();
        let mut timings = AnswerTimings::default();

        let result = self.run(question, &mut timings).await;
        timings.total = started.elapsed();

        match &result {
            Ok(answer) => {
                info!(
                    source = %answer.source,
                    persisted = answer.persisted,
                    total_ms = timings.total.as_millis() as u64,
                    "Answered question"
                );
                self.metrics.record_answer(answer.source, &timings);
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Cascade failed");
                self.metrics.record_failure();
            }
        }
        result
    }

    async fn run(
        &self,
        question: &Question,
        timings: &mut AnswerTimings,
    ) -> Result<AnswerResult, AssistantError> {
        let text = question.as_str();

        let stage = Instant::now();
        let q_emb = self
            .settings
            .embed_retry
            .call("embed", || self.embedder.embed(text))
            .await?;
        timings.embed = Some(stage.elapsed());

        let stage = Instant::now();
        let memory_filter = QueryFilter {
            created_at_or_after: self.settings.memory.live_since(get_current_timestamp()),
        };
        let nearest_memory = self
            .store
            .query(Collection::Memory, &q_emb, 1, &memory_filter)
            .await?
            .into_iter()
            .next();
        timings.memory_lookup = Some(stage.elapsed());

        if let Some(hit) = nearest_memory {
            if hit.distance < self.settings.memory_threshold {
                debug!(
                    id = %Collection::Memory.label(hit.record.id),
                    distance = hit.distance,
                    "Memory hit"
                );
                return Ok(AnswerResult {
                    text: hit.record.text,
                    source: AnswerSource::Memory,
                    persisted: false,
                });
            }
            debug!(distance = hit.distance, "Nearest memory entry too far");
        }

        let stage = Instant::now();
        let nearest_policy = self
            .store
            .query(Collection::Policies, &q_emb, 1, &QueryFilter::default())
            .await?
            .into_iter()
            .next();
        timings.policy_lookup = Some(stage.elapsed());

        let stage = Instant::now();
        let grounded = match nearest_policy {
            Some(chunk) => {
                debug!(
                    id = %Collection::Policies.label(chunk.record.id),
                    distance = chunk.distance,
                    "Grounding on policy chunk"
                );
                let prompt = grounded_prompt(&chunk.record.text, text);
                let reply = self.generate(&prompt).await?;
                if is_not_found(&reply) {
                    debug!("Policy chunk does not answer the question");
                    None
                } else {
                    Some(reply.trim().to_string())
                }
            }
            None => {
                debug!("No policy chunks stored");
                None
            }
        };

        let (answer, source) = match grounded {
            Some(answer) => (answer, AnswerSource::Policy),
            None => {
                let reply = self.generate(&fallback_prompt(text)).await?;
                (reply.trim().to_string(), AnswerSource::Fallback)
            }
        };
        timings.generation = Some(stage.elapsed());

        let persisted = self.remember(question, &answer, source, q_emb).await?;
        if !persisted {
            warn!("Answer was not kept in memory");
        }

        Ok(AnswerResult {
            text: answer,
            source,
            persisted,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        Ok(self
            .settings
            .generate_retry
            .call("generate", || self.generator.generate(prompt))
            .await?)
    }

    /// Stores the answer keyed by the question embedding under the memory
    /// policy. Returns whether the entry is in the store afterwards.
    async fn remember(
        &self,
        question: &Question,
        answer: &str,
        source: AnswerSource,
        question_embedding: Vec<f32>,
    ) -> Result<bool, AssistantError> {
        let now = get_current_timestamp();

        // Expired entries go first so their dedup keys can't absorb this write.
        if let Some(cutoff) = self.settings.memory.live_since(now) {
            let expired = PruneRule {
                keep_newest: None,
                created_before: Some(cutoff),
            };
            let removed = self.store.prune(Collection::Memory, &expired).await?;
            if removed > 0 {
                debug!(removed, "Pruned expired memory entries");
            }
        }

        let record = NewRecord::new(answer, question_embedding)
            .with_metadata(RecordMetadata {
                question: Some(question.as_str().to_string()),
                origin: Some(source.memory_origin().to_string()),
                source_file: None,
            })
            .with_dedup_key(memory_dedup_key(question.as_str(), answer));

        let outcome = self.store.insert(Collection::Memory, record).await?;
        debug!(
            id = %Collection::Memory.label(outcome.id),
            created = outcome.created,
            "Stored answer in memory"
        );

        if let Some(keep) = self.settings.memory.max_entries {
            let overflow = PruneRule {
                keep_newest: Some(keep),
                created_before: None,
            };
            let removed = self.store.prune(Collection::Memory, &overflow).await?;
            if removed > 0 {
                debug!(removed, "Evicted oldest memory entries");
                return Ok(self
                    .store
                    .get(Collection::Memory, outcome.id)
                    .await?
                    .is_some());
            }
        }
        Ok(true)
    }
}

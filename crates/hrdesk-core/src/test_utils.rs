//! Test utilities for hrdesk-core.
//!
//! Deterministic stand-ins for the embedding and generation providers, so
//! cascade and ingestion tests run without model files or network access.
//! Only compiled when running tests.

use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, GenerationError};
use crate::generation::Generator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bag-of-words embedder: each lowercase word is hashed into one of `dim`
/// buckets. Identical texts embed identically; texts sharing no words are
/// (nearly) orthogonal.
pub struct KeywordEmbedder {
    dim: usize,
}

impl KeywordEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let hash = word
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
        (hash % self.dim as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }
}

enum Script {
    Fixed(String),
    Sequence(Mutex<VecDeque<String>>),
    Failing,
}

/// Generator that replays canned replies and records every prompt.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Always returns `reply`.
    pub fn replying(reply: &str) -> Self {
        Self::with_script(Script::Fixed(reply.to_string()))
    }

    /// Returns `replies` in order, then the last one forever.
    pub fn sequence<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_script(Script::Sequence(Mutex::new(
            replies.into_iter().map(str::to_string).collect(),
        )))
    }

    /// Always fails with a non-retryable error.
    pub fn failing() -> Self {
        Self::with_script(Script::Failing)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_id(&self) -> &str {
        "scripted-test"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.script {
            Script::Fixed(reply) => Ok(reply.clone()),
            Script::Sequence(replies) => {
                let mut replies = replies.lock().unwrap();
                let reply = if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                };
                Ok(reply.unwrap_or_default())
            }
            Script::Failing => Err(GenerationError::Http {
                status: 400,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

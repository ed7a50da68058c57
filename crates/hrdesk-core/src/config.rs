//! Production configuration constants.
//!
//! These values define the behaviour of the answer cascade and the corpus
//! loader. Runtime-tunable settings live in [`crate::assistant::AssistantConfig`];
//! everything here is fixed for parity across deployments.
//!
//! # Usage
//!
//! ```
//! use hrdesk_core::config::{EMBEDDING_DIM, MEMORY_DISTANCE_THRESHOLD};
//!
//! let embedding = vec![0.0f32; EMBEDDING_DIM];
//! assert_eq!(embedding.len(), 384);
//! assert!(MEMORY_DISTANCE_THRESHOLD < 1.0);
//! ```

use std::time::Duration;

// =============================================================================
// Embedding Model Configuration
// =============================================================================

/// Embedding vector dimension (all-MiniLM-L6-v2 hidden_size).
pub const EMBEDDING_DIM: usize = 384;

/// Hugging Face identifier of the default embedding model.
pub const EMBEDDING_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Maximum tokens fed to the embedding model. Longer inputs are truncated.
pub const MAX_EMBEDDING_TOKENS: usize = 256;

// =============================================================================
// Corpus Configuration
// =============================================================================

/// Length (in characters) a policy chunk must exceed after trimming.
///
/// Pieces of this length or shorter are discarded by the splitter.
pub const MIN_CHUNK_CHARS: usize = 30;

/// Delimiter the corpus splitter cuts on.
pub const CHUNK_DELIMITER: char = '.';

/// Extension of files picked up from the corpus directory.
pub const CORPUS_FILE_EXTENSION: &str = "txt";

// =============================================================================
// Answer Cascade Configuration
// =============================================================================

/// Memory hits must be strictly closer than this distance.
pub const MEMORY_DISTANCE_THRESHOLD: f32 = 0.15;

/// Token the generator returns when the policy text does not answer the question.
pub const NOT_FOUND_SENTINEL: &str = "NOT_FOUND";

/// Name of the collection holding policy chunks.
pub const POLICY_COLLECTION: &str = "hr_policies";

/// Name of the collection holding answered questions.
pub const MEMORY_COLLECTION: &str = "qa_memory";

/// Questions offered as one-click suggestions on every surface.
pub const SUGGESTED_QUESTIONS: [&str; 3] = [
    "Can leaves be carried forward?",
    "What is the work from home policy?",
    "What is the notice period?",
];

// =============================================================================
// Provider Call Configuration
// =============================================================================

/// Upper bound for a single provider call (embedding or generation).
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per provider call, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubled on every further attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Ceiling for the retry backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// An ingestion claim older than this is considered abandoned.
pub const DEFAULT_STALE_INGESTION: Duration = Duration::from_secs(600);

/// Default hosted generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_dim_matches_minilm() {
        assert_eq!(EMBEDDING_DIM, 384);
    }

    #[test]
    fn test_collection_names_are_distinct() {
        assert_ne!(POLICY_COLLECTION, MEMORY_COLLECTION);
    }

    #[test]
    fn test_backoff_bounds() {
        let initial = DEFAULT_INITIAL_BACKOFF;
        let max = DEFAULT_MAX_BACKOFF;
        assert!(initial < max, "initial backoff must stay under the ceiling");
    }
}

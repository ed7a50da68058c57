//! Error types for hrdesk-core.
//!
//! Each concern owns its error enum (embedding, generation, corpus loading,
//! storage). [`AssistantError`] unifies them for callers of the
//! [`Assistant`](crate::assistant::Assistant) and exposes a stable
//! [`kind`](AssistantError::kind) label for logs.

use std::time::Duration;
use thiserror::Error;

pub use crate::storage::StoreError;

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Failed to load model from bytes
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    /// Failed to create tensor during inference
    #[error("Failed to create tensor: {0}")]
    TensorCreation(String),
    /// Forward pass through the model failed
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    /// Failed to tokenize text
    #[error("Tokenization failed: {0}")]
    TokenizationFailed(String),
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Tokenizer not available or initialization failed
    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),
}

/// Errors that can occur while calling the generative model.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset)
    #[error("Transport error: {0}")]
    Transport(String),
    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {message}")]
    Http { status: u16, message: String },
    /// The response body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The provider returned no candidate text (e.g. safety block)
    #[error("Empty response: {0}")]
    EmptyResponse(String),
    /// Missing credential or invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GenerationError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure of an external provider call, after timeouts and retries.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Embedding model failure
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Generative model failure
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// The call did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl ProviderError {
    /// Whether the retry loop should try again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Embedding(_) => false,
            ProviderError::Generation(e) => e.is_transient(),
            ProviderError::Timeout { .. } => true,
        }
    }
}

/// Errors raised while reading the policy corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Corpus directory does not exist
    #[error("Corpus directory not found: {0}")]
    DirectoryNotFound(String),
    /// Path exists but is not a directory
    #[error("Corpus path is not a directory: {0}")]
    NotADirectory(String),
    /// Directory listing failed
    #[error("Failed to read corpus directory {path}: {source}")]
    DirectoryRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A corpus file could not be read (missing permissions, invalid UTF-8)
    #[error("Failed to read corpus file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error returned by the assistant.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Embedding or generation failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Policy corpus missing or unreadable
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    /// Vector store unavailable or corrupt
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AssistantError {
    /// Short label used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantError::Provider(_) => "provider",
            AssistantError::Corpus(_) => "corpus",
            AssistantError::Store(_) => "store",
        }
    }

    /// Terse message suitable for end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            AssistantError::Provider(_) => {
                "The assistant could not reach its language services. Please try again."
            }
            AssistantError::Corpus(_) => "The HR policy documents could not be loaded.",
            AssistantError::Store(_) => "The assistant's knowledge store is unavailable.",
        }
    }
}

impl From<EmbeddingError> for AssistantError {
    fn from(err: EmbeddingError) -> Self {
        AssistantError::Provider(ProviderError::Embedding(err))
    }
}

impl From<GenerationError> for AssistantError {
    fn from(err: GenerationError) -> Self {
        AssistantError::Provider(ProviderError::Generation(err))
    }
}

//! Text embedding.
//!
//! ## Core Traits
//!
//! - [`EmbeddingProvider`] - Async text-to-vector interface used by the cascade
//! - [`Embedder`] - Token-level model inference
//! - [`ModelConfig`] - Model configuration parameters
//!
//! ## Implementations (feature `local-embedding`)
//!
//! - [`MiniLmEmbedder`] - BERT encoder with masked mean pooling on Candle
//! - [`TokenizerHandle`] - Wrapper for Hugging Face tokenizers
//! - [`LocalEmbeddingProvider`] - Loads a model directory and serves embeddings
//!
//! ## Example
//!
//! ```ignore
//! use hrdesk_core::embedding::{EmbeddingProvider, LocalEmbeddingProvider};
//!
//! let provider = LocalEmbeddingProvider::from_dir(Path::new("assets/models/all-MiniLM-L6-v2"))?;
//! let vector = provider.embed("Can leaves be carried forward?").await?;
//! ```

mod traits;

pub mod config;

#[cfg(feature = "local-embedding")]
pub mod model;
#[cfg(feature = "local-embedding")]
pub mod provider;
#[cfg(feature = "local-embedding")]
pub mod tokenizer;

pub use traits::{Embedder, EmbeddingProvider, ModelConfig};

pub use config::MiniLmConfig;

#[cfg(feature = "local-embedding")]
pub use model::MiniLmEmbedder;
#[cfg(feature = "local-embedding")]
pub use provider::LocalEmbeddingProvider;
#[cfg(feature = "local-embedding")]
pub use tokenizer::TokenizerHandle;

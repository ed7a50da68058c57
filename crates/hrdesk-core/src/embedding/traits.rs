//! Traits for embedding operations.
//!
//! [`EmbeddingProvider`] is the text-in, vector-out seam the answer cascade
//! and the policy ingestor depend on. [`Embedder`] and [`ModelConfig`]
//! describe the token-level model underneath the local provider.

use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Turns text into a fixed-length vector.
///
/// The same provider must embed the corpus and the questions; vectors from
/// different providers are not comparable.
///
/// # Examples
///
/// ```ignore
/// let provider: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::from_dir(dir)?);
/// let vector = provider.embed("What is the notice period?").await?;
/// assert_eq!(vector.len(), provider.dimension());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model, recorded in logs.
    fn model_id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Token-level embedding model.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the local provider runs inference
/// on tokio's blocking pool.
pub trait Embedder: Send + Sync {
    /// Returns the maximum number of position embeddings (sequence length).
    fn max_position_embeddings(&self) -> usize;

    /// Returns the embedding dimension (vector size).
    fn embedding_dim(&self) -> usize;

    /// Generates an embedding from token IDs.
    fn embed_tokens(&self, token_ids: Vec<u32>) -> Result<Vec<f32>, EmbeddingError>;

    /// Generates embeddings for a batch of token sequences.
    ///
    /// Sequences may differ in length; implementations pad and mask.
    fn embed_batch_tokens(
        &self,
        batch_token_ids: Vec<Vec<u32>>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Trait for embedding model configurations.
pub trait ModelConfig: Clone + Send + Sync {
    /// Returns the model identifier (e.g., "sentence-transformers/all-MiniLM-L6-v2").
    fn model_id(&self) -> &str;

    /// Returns the output embedding dimension.
    fn embedding_dim(&self) -> usize;

    /// Returns the maximum sequence length the model can handle.
    fn max_sequence_length(&self) -> usize;

    /// Whether embeddings should be L2 normalized (unit vectors).
    fn normalize_embeddings(&self) -> bool;
}

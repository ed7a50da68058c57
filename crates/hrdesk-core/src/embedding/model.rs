//! MiniLM sentence embedding inference on Candle.

use super::config::MiniLmConfig;
use super::traits::{Embedder, ModelConfig};
use crate::error::EmbeddingError;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::BertModel;
use tracing::{debug, info};

/// BERT-encoder embedder with masked mean pooling.
///
/// Produces the same vectors as the sentence-transformers pipeline for
/// all-MiniLM-L6-v2: token embeddings averaged over the attention mask,
/// then L2 normalized.
///
/// # Examples
///
/// ```ignore
/// let model_bytes = std::fs::read("model.safetensors")?;
/// let model = MiniLmEmbedder::from_bytes(model_bytes, MiniLmConfig::default())?;
///
/// let token_ids = vec![101, 2054, 2003, 1996, 5060, 2558, 1029, 102];
/// let embedding = model.embed_tokens(token_ids)?;
/// assert_eq!(embedding.len(), 384);
/// ```
pub struct MiniLmEmbedder {
    model: BertModel,
    config: MiniLmConfig,
    device: Device,
}

impl MiniLmEmbedder {
    /// Creates a model from safetensors bytes.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::ModelLoad` if the weights don't match the
    /// configuration or can't be parsed.
    pub fn from_bytes(model_bytes: Vec<u8>, config: MiniLmConfig) -> Result<Self, EmbeddingError> {
        info!(
            "Loading embedding model '{}' ({:.2}MB)",
            config.model_id,
            model_bytes.len() as f64 / 1_000_000.0
        );

        if model_bytes.len() < 8 {
            return Err(EmbeddingError::ModelLoad(
                "Model file too small".to_string(),
            ));
        }

        let device = Self::select_device();
        let bert_config = config.to_bert_config()?;

        let vb = VarBuilder::from_buffered_safetensors(model_bytes, DType::F32, &device)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to create VarBuilder: {}", e)))?;

        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to create BertModel: {}", e)))?;

        info!(
            "Model ready: {}d hidden, {} layers, {} heads",
            config.hidden_size, config.num_hidden_layers, config.num_attention_heads
        );

        Ok(Self {
            model,
            config,
            device,
        })
    }

    pub fn config(&self) -> &MiniLmConfig {
        &self.config
    }

    /// Selects the best available compute device.
    ///
    /// Tries CUDA, then Metal, and falls back to CPU.
    pub fn select_device() -> Device {
        if let Ok(cuda_device) = Device::new_cuda(0) {
            info!("Using CUDA GPU");
            return cuda_device;
        }

        if let Ok(metal_device) = Device::new_metal(0) {
            info!("Using Metal GPU");
            return metal_device;
        }

        info!("Using CPU");
        Device::Cpu
    }

    /// Averages token vectors over the attention mask.
    ///
    /// `embeddings` is `[batch, seq, hidden]`, `mask` is `[batch, seq]` (f32).
    fn masked_mean_pool(embeddings: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let infer = |stage: &str, e: candle_core::Error| {
            EmbeddingError::InferenceFailed(format!("Failed to {}: {}", stage, e))
        };

        let expanded = mask.unsqueeze(2).map_err(|e| infer("expand mask", e))?;
        let summed = embeddings
            .broadcast_mul(&expanded)
            .map_err(|e| infer("apply mask", e))?
            .sum(1)
            .map_err(|e| infer("sum", e))?;
        // Every sequence carries [CLS] and [SEP], so counts are never zero
        let counts = mask
            .sum_keepdim(1)
            .map_err(|e| infer("count tokens", e))?;
        summed
            .broadcast_div(&counts)
            .map_err(|e| infer("average", e))
    }

    /// Applies L2 normalization to create unit vectors.
    fn normalize_l2(v: &Tensor) -> Result<Tensor, EmbeddingError> {
        v.broadcast_div(
            &v.sqr()
                .map_err(|e| EmbeddingError::InferenceFailed(format!("Failed to square: {}", e)))?
                .sum_keepdim(1)
                .map_err(|e| EmbeddingError::InferenceFailed(format!("Failed to sum: {}", e)))?
                .sqrt()
                .map_err(|e| EmbeddingError::InferenceFailed(format!("Failed to sqrt: {}", e)))?,
        )
        .map_err(|e| EmbeddingError::InferenceFailed(format!("Failed to normalize: {}", e)))
    }
}

impl Embedder for MiniLmEmbedder {
    fn max_position_embeddings(&self) -> usize {
        self.config.max_position_embeddings
    }

    fn embedding_dim(&self) -> usize {
        self.config.hidden_size
    }

    fn embed_tokens(&self, token_ids: Vec<u32>) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch_tokens(vec![token_ids])?
            .pop()
            .ok_or_else(|| EmbeddingError::InferenceFailed("Model returned no embedding".into()))
    }

    fn embed_batch_tokens(
        &self,
        batch_token_ids: Vec<Vec<u32>>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if batch_token_ids.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = batch_token_ids.len();
        let max_len = batch_token_ids
            .iter()
            .map(|ids| ids.len())
            .max()
            .unwrap_or(0)
            .min(self.max_position_embeddings());

        // Pad with 0 ([PAD]) and mask the padding out
        let mut flat_ids = Vec::with_capacity(batch_size * max_len);
        let mut flat_mask = Vec::with_capacity(batch_size * max_len);
        for ids in &batch_token_ids {
            for position in 0..max_len {
                match ids.get(position) {
                    Some(&id) => {
                        flat_ids.push(id);
                        flat_mask.push(1u32);
                    }
                    None => {
                        flat_ids.push(0);
                        flat_mask.push(0);
                    }
                }
            }
        }

        let input_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)
            .map_err(|e| {
                EmbeddingError::TensorCreation(format!("Failed to create batch tensor: {}", e))
            })?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)
            .map_err(|e| {
                EmbeddingError::TensorCreation(format!("Failed to create mask tensor: {}", e))
            })?;
        let token_type_ids = input_ids.zeros_like().map_err(|e| {
            EmbeddingError::TensorCreation(format!("Failed to create token types: {}", e))
        })?;

        // [batch, seq] -> [batch, seq, hidden]
        let embeddings = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| EmbeddingError::InferenceFailed(format!("Forward pass failed: {}", e)))?;

        let mask_f32 = attention_mask.to_dtype(DType::F32).map_err(|e| {
            EmbeddingError::InferenceFailed(format!("Failed to convert mask: {}", e))
        })?;
        let pooled = Self::masked_mean_pool(&embeddings, &mask_f32)?;

        let normalized = if self.config.normalize_embeddings() {
            Self::normalize_l2(&pooled)?
        } else {
            pooled
        };

        let result = normalized.to_vec2::<f32>().map_err(|e| {
            EmbeddingError::InferenceFailed(format!("Failed to convert to vec: {}", e))
        })?;
        debug!(batch_size, max_len, "Embedded batch");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_load_invalid_bytes() {
        let result = MiniLmEmbedder::from_bytes(vec![1, 2, 3], MiniLmConfig::default());
        assert!(matches!(result, Err(EmbeddingError::ModelLoad(_))));
    }

    #[test]
    fn test_masked_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        // One sequence: two real tokens and one padded token
        let embeddings = Tensor::from_vec(
            vec![1.0f32, 0.0, 3.0, 2.0, 100.0, 100.0],
            (1, 3, 2),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 1.0, 0.0], (1, 3), &device).unwrap();

        let pooled = MiniLmEmbedder::masked_mean_pool(&embeddings, &mask)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(pooled, vec![vec![2.0, 1.0]]);
    }

    #[test]
    fn test_normalize_l2_unit_length() {
        let device = Device::Cpu;
        let v = Tensor::from_vec(vec![3.0f32, 4.0], (1, 2), &device).unwrap();
        let normalized = MiniLmEmbedder::normalize_l2(&v)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert!((normalized[0][0] - 0.6).abs() < 1e-6);
        assert!((normalized[0][1] - 0.8).abs() < 1e-6);
    }
}

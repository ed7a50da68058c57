//! Configuration for the MiniLM sentence embedding model.

use super::traits::ModelConfig;
use crate::config::{EMBEDDING_DIM, EMBEDDING_MODEL_ID};
#[cfg(feature = "local-embedding")]
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};

/// Configuration for BERT-style sentence embedding models such as
/// all-MiniLM-L6-v2.
///
/// Field names follow the Hugging Face `config.json` layout, so a model
/// directory's config can be deserialized directly; unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiniLmConfig {
    /// Model identifier (not part of `config.json`)
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Whether to apply L2 normalization to embeddings
    #[serde(default = "default_normalize")]
    pub normalize_embeddings: bool,

    pub vocab_size: usize,

    /// Hidden dimension size (embedding output dimension)
    pub hidden_size: usize,

    pub num_hidden_layers: usize,

    pub num_attention_heads: usize,

    /// Intermediate (FFN) dimension size
    pub intermediate_size: usize,

    /// Learned absolute positions; inputs beyond this are truncated.
    pub max_position_embeddings: usize,

    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,

    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

fn default_model_id() -> String {
    EMBEDDING_MODEL_ID.to_string()
}

fn default_normalize() -> bool {
    true
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl Default for MiniLmConfig {
    fn default() -> Self {
        // sentence-transformers/all-MiniLM-L6-v2
        Self {
            model_id: default_model_id(),
            normalize_embeddings: true,
            vocab_size: 30522,
            hidden_size: EMBEDDING_DIM,
            num_hidden_layers: 6,
            num_attention_heads: 12,
            intermediate_size: 1536,
            max_position_embeddings: 512,
            type_vocab_size: default_type_vocab_size(),
            layer_norm_eps: default_layer_norm_eps(),
        }
    }
}

impl ModelConfig for MiniLmConfig {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embedding_dim(&self) -> usize {
        self.hidden_size
    }

    fn max_sequence_length(&self) -> usize {
        self.max_position_embeddings
    }

    fn normalize_embeddings(&self) -> bool {
        self.normalize_embeddings
    }
}

impl MiniLmConfig {
    /// Parses a Hugging Face `config.json`.
    #[cfg(feature = "local-embedding")]
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("Invalid model config: {}", e)))
    }

    /// Builds the candle BERT configuration for this model.
    #[cfg(feature = "local-embedding")]
    pub fn to_bert_config(
        &self,
    ) -> Result<candle_transformers::models::bert::Config, EmbeddingError> {
        let value = serde_json::json!({
            "vocab_size": self.vocab_size,
            "hidden_size": self.hidden_size,
            "num_hidden_layers": self.num_hidden_layers,
            "num_attention_heads": self.num_attention_heads,
            "intermediate_size": self.intermediate_size,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.1,
            "max_position_embeddings": self.max_position_embeddings,
            "type_vocab_size": self.type_vocab_size,
            "initializer_range": 0.02,
            "layer_norm_eps": self.layer_norm_eps,
            "pad_token_id": 0,
            "position_embedding_type": "absolute",
            "use_cache": true,
            "classifier_dropout": null,
            "model_type": "bert"
        });
        serde_json::from_value(value)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("Invalid BERT config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MiniLmConfig::default();
        assert_eq!(config.embedding_dim(), 384);
        assert_eq!(config.max_sequence_length(), 512);
        assert!(config.normalize_embeddings());
        assert_eq!(config.model_id(), "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn test_parse_hugging_face_config() {
        let json = br#"{
            "_name_or_path": "nreimers/MiniLM-L6-H384-uncased",
            "architectures": ["BertModel"],
            "hidden_act": "gelu",
            "hidden_size": 384,
            "intermediate_size": 1536,
            "max_position_embeddings": 512,
            "num_attention_heads": 12,
            "num_hidden_layers": 6,
            "vocab_size": 30522
        }"#;
        let config: MiniLmConfig = serde_json::from_slice(json).unwrap();
        assert_eq!(config, MiniLmConfig::default());
    }

    #[cfg(feature = "local-embedding")]
    #[test]
    fn test_bert_config_conversion() {
        let bert = MiniLmConfig::default().to_bert_config().unwrap();
        assert_eq!(bert.hidden_size, 384);
        assert_eq!(bert.num_hidden_layers, 6);
    }
}

//! # HR Desk Core
//!
//! Library behind the HR Desk assistant: answers employee questions from a
//! folder of HR policy text, remembering every answer it gives.
//!
//! This crate holds the retrieval cascade, the one-time corpus ingestion,
//! the provider adapters, and the vector store, so every frontend (CLI,
//! chat, web, MCP) shares the same behaviour.
//!
//! ## Modules
//!
//! - [`assistant`] - Application context shared by all surfaces
//! - [`cascade`] - Memory → policy → fallback answer cascade
//! - [`ingest`] - Guarded one-time ingestion of the policy corpus
//! - [`corpus`] - Corpus directory loading and sentence splitting
//! - [`embedding`] - Embedding provider trait and local MiniLM inference
//! - [`generation`] - Generator trait and the Gemini adapter
//! - [`storage`] - Vector store trait with in-memory and redb backends
//! - [`retry`] - Timeouts and bounded retries for provider calls
//! - [`config`] - Production configuration constants
//! - [`error`] - Error types per concern, unified under [`AssistantError`]
//! - [`metrics`] - Stage timings with rolling averages

pub mod assistant;
pub mod cascade;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod metrics;
pub mod retry;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use assistant::{Assistant, AssistantConfig, StoreStatus};
pub use cascade::{AnswerResult, AnswerSource, MemoryPolicy, Question};
pub use error::AssistantError;
pub use ingest::IngestionOutcome;
pub use storage::{Collection, VectorStore};

//! Cascade inputs and outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-blank question.
///
/// The text is kept exactly as typed; blankness is only checked, never
/// fixed up, so memory entries record what the user asked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question(String);

impl Question {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which cascade stage produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// A previously answered, near-identical question
    Memory,
    /// Grounded in a retrieved policy chunk
    Policy,
    /// General model answer without policy grounding
    Fallback,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Memory => "memory",
            AnswerSource::Policy => "policy",
            AnswerSource::Fallback => "fallback",
        }
    }

    /// Value stored as a memory entry's origin (`policy` or `llm`).
    pub(crate) fn memory_origin(&self) -> &'static str {
        match self {
            AnswerSource::Policy => "policy",
            AnswerSource::Memory | AnswerSource::Fallback => "llm",
        }
    }

    /// Short label shown next to an answer.
    pub fn badge(&self) -> &'static str {
        match self {
            AnswerSource::Memory => "From memory",
            AnswerSource::Policy => "From HR policy",
            AnswerSource::Fallback => "General answer (not in policy)",
        }
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub text: String,
    pub source: AnswerSource,
    /// Whether this run wrote a memory entry.
    pub persisted: bool,
}

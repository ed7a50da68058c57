//! Output formatting for answers and reports.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use hrdesk_core::metrics::MetricsSnapshot;
use hrdesk_core::storage::IngestionState;
use hrdesk_core::{AnswerResult, IngestionOutcome, StoreStatus};
use serde::Serialize;

/// JSON output structure for one answer
#[derive(Serialize)]
pub struct JsonAnswer<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    /// `memory`, `policy` or `fallback`
    pub source: &'a str,
    pub persisted: bool,
}

/// Formats an answer as JSON.
pub fn format_answer_json(question: &str, result: &AnswerResult) -> String {
    let output = JsonAnswer {
        question,
        answer: &result.text,
        source: result.source.as_str(),
        persisted: result.persisted,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an answer for the terminal, badge first.
pub fn format_answer_human(result: &AnswerResult) -> String {
    format!("[{}]\n{}", result.source.badge(), result.text)
}

fn format_timestamp(secs: u64) -> String {
    format!("{}s since epoch", secs)
}

fn format_ingestion_state(state: &IngestionState) -> String {
    match state {
        IngestionState::NotStarted => "not started".to_string(),
        IngestionState::InProgress { started_at } => {
            format!("in progress (claimed {})", format_timestamp(*started_at))
        }
        IngestionState::Complete {
            chunk_count,
            completed_at,
        } => format!(
            "complete ({} chunk{}, {})",
            chunk_count,
            if *chunk_count == 1 { "" } else { "s" },
            format_timestamp(*completed_at)
        ),
    }
}

/// Formats the result of an `ingest` run.
pub fn format_ingestion(outcome: &IngestionOutcome) -> String {
    match outcome {
        IngestionOutcome::Ingested {
            chunks,
            files,
            reclaimed,
        } => {
            let mut line = format!(
                "Ingested {} chunk{} from {} file{}.",
                chunks,
                if *chunks == 1 { "" } else { "s" },
                files,
                if *files == 1 { "" } else { "s" }
            );
            if *reclaimed {
                line.push_str(" (took over an abandoned ingestion)");
            }
            line
        }
        IngestionOutcome::AlreadyComplete { chunks } => format!(
            "Policies already ingested ({} chunks). Run `hrdesk reset --policies` to re-ingest.",
            chunks
        ),
        IngestionOutcome::InProgressElsewhere { started_at } => format!(
            "Another process is ingesting policies (claimed {}).",
            format_timestamp(*started_at)
        ),
    }
}

fn format_ms(value: Option<f64>) -> String {
    value
        .map(|ms| format!("{:.1} ms", ms))
        .unwrap_or_else(|| "-".to_string())
}

/// Formats `status` for the terminal.
pub fn format_status_human(status: &StoreStatus, metrics: &MetricsSnapshot) -> String {
    let mut output = String::new();
    output.push_str(&format!("Policy chunks:    {}\n", status.policy_chunks));
    output.push_str(&format!("Memory entries:   {}\n", status.memory_entries));
    output.push_str(&format!(
        "Ingestion:        {}\n",
        format_ingestion_state(&status.ingestion)
    ));
    output.push_str(&format!("Embedding model:  {}\n", status.embedding_model));
    output.push_str(&format!("Generation model: {}\n", status.generation_model));

    if let Some(chunks) = metrics.last_ingestion_chunks {
        output.push_str(&format!(
            "Last ingestion:   {} chunks in {}\n",
            chunks,
            format_ms(metrics.last_ingestion_ms)
        ));
    }
    output.trim_end().to_string()
}

#[derive(Serialize)]
struct JsonStatus<'a> {
    #[serde(flatten)]
    status: &'a StoreStatus,
    metrics: &'a MetricsSnapshot,
}

/// Formats `status` as JSON.
pub fn format_status_json(status: &StoreStatus, metrics: &MetricsSnapshot) -> String {
    serde_json::to_string_pretty(&JsonStatus { status, metrics })
        .unwrap_or_else(|_| "{}".to_string())
}

/// Numbered list of suggested questions, as shown by `chat`.
pub fn format_suggestions(suggestions: &[&str]) -> String {
    suggestions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("  {}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n")
}

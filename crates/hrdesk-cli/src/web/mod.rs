//! Single-page web form and JSON API.
//!
//! Routes:
//! - `GET /` - question form with suggested questions
//! - `POST /api/answer` - `{"question": "..."}` → answer with its source
//!   (204 for a blank question)
//! - `GET /api/stats` - collection counts, ingestion marker and timings

use anyhow::{Context, Result};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use hrdesk_core::metrics::MetricsSnapshot;
use hrdesk_core::{Assistant, AssistantError, StoreStatus};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const INDEX_TEMPLATE: &str = include_str!("index.html");

/// Shared handler state.
#[derive(Clone)]
pub struct WebState {
    assistant: Arc<Assistant>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub source: &'static str,
    pub badge: &'static str,
    pub persisted: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub status: StoreStatus,
    pub metrics: MetricsSnapshot,
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_index(suggestions: &[&str]) -> String {
    let buttons = suggestions
        .iter()
        .map(|q| {
            let q = escape_html(q);
            format!(
                "    <button type=\"button\" data-question=\"{}\">{}</button>",
                q, q
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    INDEX_TEMPLATE.replace("{{SUGGESTIONS}}", &buttons)
}

fn error_status(err: &AssistantError) -> StatusCode {
    match err {
        AssistantError::Provider(_) => StatusCode::BAD_GATEWAY,
        AssistantError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        AssistantError::Corpus(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AssistantError) -> Response {
    (
        error_status(err),
        Json(ErrorResponse {
            error: err.user_message(),
            kind: err.kind(),
        }),
    )
        .into_response()
}

async fn index(State(state): State<WebState>) -> Html<String> {
    Html(render_index(state.assistant.suggested_questions()))
}

async fn answer(State(state): State<WebState>, Json(request): Json<AnswerRequest>) -> Response {
    match state.assistant.ask(&request.question).await {
        Ok(Some(result)) => Json(AnswerResponse {
            answer: result.text,
            source: result.source.as_str(),
            badge: result.source.badge(),
            persisted: result.persisted,
        })
        .into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Answer request failed");
            error_response(&e)
        }
    }
}

async fn stats(State(state): State<WebState>) -> Response {
    match state.assistant.status().await {
        Ok(status) => Json(StatsResponse {
            status,
            metrics: state.assistant.metrics(),
        })
        .into_response(),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Stats request failed");
            error_response(&e)
        }
    }
}

/// Builds the router with all routes.
pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/answer", post(answer))
        .route("/api/stats", get(stats))
        .with_state(WebState { assistant })
        .layer(TraceLayer::new_for_http())
}

/// Serves the web UI until the process is stopped.
pub async fn serve(assistant: Arc<Assistant>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid address: {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Serving HR Desk on http://{}", addr);
    eprintln!("HR Desk is running at http://{}", addr);

    axum::serve(listener, router(assistant))
        .await
        .context("Server error")?;
    Ok(())
}

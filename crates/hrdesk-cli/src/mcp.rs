//! MCP (Model Context Protocol) server implementation.
//!
//! Exposes the HR assistant as a single `ask_hr_question` tool for AI
//! assistants. Answers go through the same cascade as every other surface,
//! so they are remembered and reused.

use anyhow::{Context, Result};
use hrdesk_core::{AnswerResult, Assistant};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorCode, ErrorData, Implementation, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

/// Question request parameters.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AskParams {
    /// The employee's question about HR policy, in plain language.
    question: String,
}

/// Answer returned to the MCP client.
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct AskResponse {
    /// The question as received.
    question: String,
    /// One-sentence answer.
    answer: String,
    /// Where the answer came from: `memory`, `policy` or `fallback`.
    source: String,
    /// Whether the answer is grounded in company policy text.
    grounded: bool,
}

impl AskResponse {
    fn new(question: String, result: AnswerResult) -> Self {
        Self {
            question,
            grounded: result.source != hrdesk_core::AnswerSource::Fallback,
            source: result.source.as_str().to_string(),
            answer: result.text,
        }
    }
}

fn make_error(code: ErrorCode, message: impl Into<String>) -> ErrorData {
    ErrorData {
        code,
        message: Cow::from(message.into()),
        data: None,
    }
}

/// MCP server that answers HR questions.
#[derive(Clone)]
pub struct HrDeskMcpServer {
    assistant: Arc<Assistant>,
    /// Tool router generated by the macro.
    tool_router: ToolRouter<Self>,
}

impl HrDeskMcpServer {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self {
            assistant,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl HrDeskMcpServer {
    #[tool(
        description = "Answer an employee question about company HR policy (leave, notice period, work from home, etc.). Returns a one-sentence answer and whether it came from stored policy text, a previous answer, or general knowledge."
    )]
    async fn ask_hr_question(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(result) = self.assistant.ask(&params.question).await.map_err(|e| {
            warn!(kind = e.kind(), error = %e, "MCP question failed");
            make_error(ErrorCode::INTERNAL_ERROR, e.user_message())
        })?
        else {
            return Ok(CallToolResult::success(vec![Content::text(
                "No question was asked.",
            )]));
        };

        let response = AskResponse::new(params.question, result);
        let json = serde_json::to_string_pretty(&response).map_err(|e| {
            make_error(
                ErrorCode::INTERNAL_ERROR,
                format!("Failed to serialize response: {}", e),
            )
        })?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for HrDeskMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "hrdesk".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("HR Desk".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "HR Desk answers questions about company HR policies. Use the \
                 'ask_hr_question' tool with the employee's question; check the 'source' \
                 field before presenting a 'fallback' answer as company policy."
                    .to_string(),
            ),
        }
    }
}

/// Runs the MCP server on stdio until the client disconnects.
pub async fn run_mcp_server(assistant: Arc<Assistant>) -> Result<()> {
    use rmcp::transport::stdio;

    let service = HrDeskMcpServer::new(assistant)
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;

    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrdesk_core::AnswerSource;

    #[test]
    fn test_response_marks_fallback_ungrounded() {
        let response = AskResponse::new(
            "Is there a gym?".to_string(),
            AnswerResult {
                text: "Many offices have one.".to_string(),
                source: AnswerSource::Fallback,
                persisted: true,
            },
        );
        assert!(!response.grounded);
        assert_eq!(response.source, "fallback");

        let policy = AskResponse::new(
            "What is the notice period?".to_string(),
            AnswerResult {
                text: "Thirty days.".to_string(),
                source: AnswerSource::Policy,
                persisted: true,
            },
        );
        assert!(policy.grounded);
    }
}

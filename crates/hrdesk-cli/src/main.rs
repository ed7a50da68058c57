//! HR Desk CLI - answers employee questions from HR policy documents.
//!
//! # Usage
//!
//! ```bash
//! # One question
//! hrdesk ask "What is the notice period?"
//! hrdesk ask "Can leaves be carried forward?" --json
//!
//! # Interactive session
//! hrdesk chat
//!
//! # Web form on http://127.0.0.1:8080
//! hrdesk serve --port 8080
//!
//! # Run as MCP server (for AI assistants)
//! hrdesk --mcp
//!
//! # Maintenance
//! hrdesk ingest
//! hrdesk status
//! hrdesk reset --memory
//! ```

mod chat;
mod config;
mod context;
mod mcp;
mod output;
mod web;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::AppOptions;
use context::AppContext;
use hrdesk_core::{Collection, Question};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// HR Desk: answers HR policy questions, remembering every answer.
///
/// Policies are read once from the corpus directory (plain .txt files) and
/// stored with every answered question in a local vector store.
#[derive(Parser)]
#[command(name = "hrdesk", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: AppOptions,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run as MCP (Model Context Protocol) server for AI assistants
    #[arg(long)]
    mcp: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question
    Ask {
        /// The question to answer
        question: String,

        /// Output the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask questions interactively
    Chat,
    /// Serve the web form and JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Ingest the policy corpus if it hasn't been ingested yet
    Ingest,
    /// Delete stored records
    Reset(ResetArgs),
    /// Show collection counts and ingestion state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = true)]
struct ResetArgs {
    /// Forget every remembered answer
    #[arg(long)]
    memory: bool,

    /// Remove policy chunks; the next start re-ingests the corpus
    #[arg(long)]
    policies: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stderr only: stdout carries answers, JSON and the MCP protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Answers one question and returns the formatted output.
///
/// A blank question is a no-op: nothing is loaded and `None` is returned.
async fn run_ask(options: &AppOptions, text: &str, json: bool) -> Result<Option<String>> {
    let Some(question) = Question::new(text) else {
        debug!("Blank question, nothing to answer");
        return Ok(None);
    };

    let ctx = AppContext::build(options, true).await?;
    ctx.ensure_policies().await?;

    let result = ctx.assistant.answer(&question).await.map_err(|e| {
        tracing::error!(kind = e.kind(), error = %e, "Question failed");
        anyhow::anyhow!(e.user_message())
    })?;

    let output = if json {
        output::format_answer_json(question.as_str(), &result)
    } else {
        output::format_answer_human(&result)
    };
    Ok(Some(output))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.mcp {
        let ctx = AppContext::build(&cli.options, true).await?;
        ctx.ensure_policies().await?;
        return mcp::run_mcp_server(ctx.assistant).await;
    }

    let Some(command) = cli.command else {
        eprintln!("No command given. Use --help for usage information.");
        std::process::exit(1);
    };

    match command {
        Command::Ask { question, json } => {
            if let Some(output) = run_ask(&cli.options, &question, json).await? {
                println!("{}", output);
            }
        }
        Command::Chat => {
            let ctx = AppContext::build(&cli.options, true).await?;
            ctx.ensure_policies().await?;
            chat::run_chat(ctx.assistant).await?;
        }
        Command::Serve { host, port } => {
            let ctx = AppContext::build(&cli.options, true).await?;
            ctx.ensure_policies().await?;
            web::serve(ctx.assistant, &host, port).await?;
        }
        Command::Ingest => {
            let ctx = AppContext::build(&cli.options, false).await?;
            let outcome = ctx.ensure_policies().await?;
            println!("{}", output::format_ingestion(&outcome));
        }
        Command::Reset(args) => {
            let ctx = AppContext::build(&cli.options, false).await?;
            let mut targets = Vec::new();
            if args.memory {
                targets.push(Collection::Memory);
            }
            if args.policies {
                targets.push(Collection::Policies);
            }
            for collection in targets {
                let removed = ctx
                    .assistant
                    .reset(collection)
                    .await
                    .with_context(|| format!("Failed to reset {}", collection))?;
                println!("Removed {} record(s) from {}.", removed, collection);
            }
        }
        Command::Status { json } => {
            let ctx = AppContext::build(&cli.options, false).await?;
            let status = ctx
                .assistant
                .status()
                .await
                .context("Failed to read store status")?;
            let metrics = ctx.assistant.metrics();
            let output = if json {
                output::format_status_json(&status, &metrics)
            } else {
                output::format_status_human(&status, &metrics)
            };
            println!("{}", output);
        }
    }

    Ok(())
}

//! Interactive question loop on stdin.

use crate::output::{format_answer_human, format_suggestions};
use anyhow::Result;
use hrdesk_core::Assistant;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Skip,
    Question(&'a str),
}

/// Maps a typed line to a question; a number picks a suggestion.
fn resolve_input<'a>(line: &'a str, suggestions: &[&'a str]) -> ChatInput<'a> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return ChatInput::Quit;
    }
    if trimmed.is_empty() {
        return ChatInput::Skip;
    }
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=suggestions.len()).contains(&n) => ChatInput::Question(suggestions[n - 1]),
        _ => ChatInput::Question(line),
    }
}

/// Runs the chat loop until EOF or `quit`.
pub async fn run_chat(assistant: Arc<Assistant>) -> Result<()> {
    let suggestions = assistant.suggested_questions();
    println!("Ask anything about HR policies. Type a number to use a suggestion, `quit` to leave.");
    println!("{}", format_suggestions(suggestions));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = match resolve_input(&line, suggestions) {
            ChatInput::Quit => break,
            ChatInput::Skip => continue,
            ChatInput::Question(q) => q,
        };
        if question != line {
            println!("{}", question);
        }

        match assistant.ask(question).await {
            Ok(Some(result)) => println!("{}", format_answer_human(&result)),
            Ok(None) => {}
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Question failed");
                eprintln!("{}", e.user_message());
            }
        }
    }
    println!();
    Ok(())
}

//! Interactive chat session against the knowledge base.

use super::ask::build_pipeline;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::QueryRequest;
use console::style;
use futures::StreamExt;
use std::io::{self, BufRead, Write};

/// Turns of history kept in the rolling window.
const MAX_HISTORY_TURNS: usize = 10;

/// Run the interactive chat command.
pub async fn run_chat(
    model: Option<String>,
    logical_routing: bool,
    semantic_routing: bool,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    let pipeline = build_pipeline(&orchestrator, &settings);

    let mut history: Vec<(String, String)> = Vec::new();

    println!("\n{}", style("Skue Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            history.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        let mut request = QueryRequest::new(input);
        request.model_id = model.clone();
        request.message_history = history.clone();
        request.use_logical_routing = logical_routing;
        request.use_semantic_routing = semantic_routing;

        print!("\n{} ", style("Skue:").cyan().bold());
        stdout.flush()?;

        match pipeline.answer_stream(&request).await {
            Ok((_, mut stream)) => {
                let mut answer = String::new();
                let mut failed = false;

                while let Some(token) = stream.next().await {
                    match token {
                        Ok(token) => {
                            print!("{}", token);
                            stdout.flush()?;
                            answer.push_str(&token);
                        }
                        Err(e) => {
                            Output::error(&format!("Stream error: {}", e));
                            failed = true;
                            break;
                        }
                    }
                }
                println!("\n");

                if !failed {
                    history.push((input.to_string(), answer));
                    if history.len() > MAX_HISTORY_TURNS {
                        let excess = history.len() - MAX_HISTORY_TURNS;
                        history.drain(..excess);
                    }
                }
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

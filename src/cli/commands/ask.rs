//! One-shot question answering with sources.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::orchestrator::Orchestrator;
use crate::rag::{DatabaseKind, QueryPipeline, QueryRequest};
use futures::StreamExt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

/// Build the query pipeline over the orchestrator's stores.
pub(crate) fn build_pipeline(orchestrator: &Orchestrator, settings: &Settings) -> QueryPipeline {
    let embedder = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
        settings.local_api_base(),
    ));

    QueryPipeline::new(
        settings.clone(),
        orchestrator.prompts().clone(),
        orchestrator.vector_store(),
        orchestrator.graph_store(),
        embedder,
    )
}

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    knowledge_base: Option<String>,
    database: &str,
    logical_routing: bool,
    semantic_routing: bool,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let database = DatabaseKind::from_str(database)
        .map_err(crate::error::SkueError::InvalidInput)?;

    let orchestrator = Orchestrator::new(settings.clone())?;
    let pipeline = build_pipeline(&orchestrator, &settings);

    let mut request = QueryRequest::new(question);
    request.model_id = model;
    request.knowledge_base = knowledge_base;
    request.database = database;
    request.use_logical_routing = logical_routing;
    request.use_semantic_routing = semantic_routing;

    let (context, mut stream) = pipeline.answer_stream(&request).await?;

    let mut stdout = std::io::stdout();
    while let Some(token) = stream.next().await {
        print!("{}", token?);
        stdout.flush()?;
    }
    println!();

    if !context.passages.is_empty() {
        Output::header("Sources");
        for passage in &context.passages {
            Output::passage(
                &passage.video_title,
                &format!("{:.0}s", passage.time),
                passage.score,
                &passage.text,
                &passage.url(),
            );
        }
    }

    Ok(())
}

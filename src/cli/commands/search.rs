//! Retrieval-only search over the vector collections.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::orchestrator::Orchestrator;
use crate::rag::{resolve_subject, Retriever};
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(
    query: &str,
    knowledge_base: Option<String>,
    limit: usize,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    let store = orchestrator.vector_store();

    let subjects = store.list_collections().await?;
    let subject = resolve_subject(knowledge_base.as_deref(), &subjects);

    let embedder = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
        settings.local_api_base(),
    ));

    let retriever = Retriever::new(store, embedder);
    let passages = retriever.retrieve(&subject, query, limit).await?;

    if passages.is_empty() {
        Output::info("No matching chunks found.");
        return Ok(());
    }

    for passage in &passages {
        Output::passage(
            &passage.video_title,
            &format!("{:.0}s", passage.time),
            passage.score,
            &passage.text,
            &passage.url(),
        );
    }

    Ok(())
}

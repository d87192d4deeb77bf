//! Ingestion command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{IngestOptions, Orchestrator};

/// Run the analyze command: ingest a video or playlist URL.
pub async fn run_analyze(
    url: &str,
    options: IngestOptions,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'skue doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Ingesting...");
    let outcome = orchestrator.ingest(url, options).await;
    spinner.finish_and_clear();

    if outcome.status_code == 200 {
        Output::success(&format!("({}) {}", outcome.status_code, outcome.message));
    } else {
        Output::error(&format!("({}) {}", outcome.status_code, outcome.message));
    }

    Ok(())
}

//! List available model ids from the configured provider.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SkueError;
use crate::openai::create_client_with_base;

/// Fetch all model ids the configured provider offers.
pub async fn available_models(settings: &Settings) -> crate::error::Result<Vec<String>> {
    let client = create_client_with_base(settings.local_api_base());

    let response = client
        .models()
        .list()
        .await
        .map_err(|e| SkueError::UpstreamUnavailable(format!("Model listing failed: {}", e)))?;

    Ok(response.data.into_iter().map(|m| m.id).collect())
}

/// Run the models command.
pub async fn run_models(settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let models = available_models(&settings).await?;

    Output::header("Available models");
    for id in &models {
        println!("  {}", id);
    }
    Output::kv("Total", &models.len().to_string());

    Ok(())
}

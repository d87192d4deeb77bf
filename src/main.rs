//! Skue CLI entry point.

use anyhow::Result;
use clap::Parser;
use skue::cli::{commands, Cli, Commands};
use skue::config::Settings;
use skue::orchestrator::IngestOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first: the log file target comes from it.
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("skue={}", log_level)),
    );

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    match settings.general.log_file_path.as_deref() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Arc::new(file)),
                )
                .init();
        }
        None => registry.init(),
    }

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Analyze {
            url,
            chunk_max_length,
            chunk_overlap_length,
            seconds_between_frames,
            max_limit_similarity,
            local_model,
            detailed_chunking,
            embedding_model,
        } => {
            let options = IngestOptions {
                chunk_max_length: *chunk_max_length,
                chunk_overlap_length: *chunk_overlap_length,
                seconds_between_frames: *seconds_between_frames,
                max_limit_similarity: *max_limit_similarity,
                local_model: *local_model,
                enabled_detailed_chunking: *detailed_chunking,
                embedding_model: embedding_model.clone(),
            };
            commands::run_analyze(url, options, settings).await?;
        }

        Commands::Ask {
            question,
            model,
            knowledge_base,
            database,
            logical_routing,
            semantic_routing,
        } => {
            commands::run_ask(
                question,
                model.clone(),
                knowledge_base.clone(),
                database,
                *logical_routing,
                *semantic_routing,
                settings,
            )
            .await?;
        }

        Commands::Chat {
            model,
            logical_routing,
            semantic_routing,
        } => {
            commands::run_chat(model.clone(), *logical_routing, *semantic_routing, settings)
                .await?;
        }

        Commands::Search {
            query,
            knowledge_base,
            limit,
        } => {
            commands::run_search(query, knowledge_base.clone(), *limit, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Models => {
            commands::run_models(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}

//! System diagnostics.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;

/// Run the doctor command: report on tools, credentials, and data paths.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Skue Doctor");
    println!();

    let mut problems = 0;

    for tool in ["yt-dlp", "ffmpeg", "ffprobe"] {
        match preflight::check_tool(tool) {
            Ok(()) => Output::success(&format!("{} found", tool)),
            Err(e) => {
                Output::error(&format!("{}", e));
                problems += 1;
            }
        }
    }

    match preflight::check_credentials(settings) {
        Ok(()) => {
            if let Some(base) = settings.local_api_base() {
                Output::success(&format!("Local API base configured: {}", base));
            } else {
                Output::success("OPENAI_API_KEY is set");
            }
        }
        Err(e) => {
            Output::error(&format!("{}", e));
            problems += 1;
        }
    }

    println!();
    Output::header("Paths");
    Output::kv(
        "Processed videos",
        &settings.general.processed_videos_path,
    );
    Output::kv(
        "Topic registry",
        &settings.topic_overview_path().display().to_string(),
    );
    Output::kv(
        "Vector store",
        &settings.vector_db_path().display().to_string(),
    );
    Output::kv(
        "Graph store",
        &settings.graph_db_path().display().to_string(),
    );
    Output::kv(
        "Config file",
        &Settings::default_config_path().display().to_string(),
    );

    println!();
    if problems == 0 {
        Output::success("All checks passed.");
    } else {
        Output::warning(&format!("{} problem(s) found.", problems));
    }

    Ok(())
}

//! First-run initialization.

use crate::cli::Output;
use crate::config::Settings;

/// Run the init command: write a default config and create data directories.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Initializing Skue");
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!(
            "Configuration already exists at {}",
            config_path.display()
        ));
    } else {
        settings.save()?;
        Output::success(&format!(
            "Wrote default configuration to {}",
            config_path.display()
        ));
    }

    if let Some(parent) = settings.topic_overview_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = settings.vector_db_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Output::success("Created data directories");

    println!();
    Output::info("Run 'skue doctor' to verify external tools and credentials.");

    Ok(())
}

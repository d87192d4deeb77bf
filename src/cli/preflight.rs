//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SkueError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion requires external tools and LLM credentials.
    Ingest,
    /// Querying requires LLM credentials.
    Query,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_credentials(settings)?;
            check_tool("yt-dlp")?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Query => {
            check_credentials(settings)?;
        }
    }
    Ok(())
}

/// Check that some LLM credential or a local server base is configured.
pub fn check_credentials(settings: &Settings) -> Result<()> {
    if settings.local_api_base().is_some() {
        return Ok(());
    }

    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SkueError::MissingConfiguration(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SkueError::MissingConfiguration(
            "OPENAI_API_KEY not set and no local API base configured. \
             Set it with: export OPENAI_API_KEY='sk-...'"
                .to_string(),
        )),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(SkueError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SkueError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SkueError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_api_base_satisfies_credentials() {
        let mut settings = Settings::default();
        settings.prompts.local_api_base = Some("http://localhost:11434/v1".to_string());
        assert!(check_credentials(&settings).is_ok());
    }
}

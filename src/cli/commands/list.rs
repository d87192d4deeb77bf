//! List ingested videos.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::topics::TopicRegistry;

/// Run the list command.
pub async fn run_list(settings: Settings) -> anyhow::Result<()> {
    let registry = TopicRegistry::load(&settings.topic_overview_path())?;
    let orchestrator = Orchestrator::new(settings)?;

    let videos = orchestrator.vector_store().list_videos().await?;

    if videos.is_empty() {
        Output::info("No videos ingested yet. Use 'skue analyze <url>' to add one.");
        return Ok(());
    }

    Output::header("Ingested videos");
    for video in &videos {
        let topic = registry
            .topic_for(&video.video_id)
            .unwrap_or(&video.collection);
        Output::video_row(&video.video_title, &video.video_id, topic, video.chunk_count);
    }

    println!();
    Output::kv("Total", &videos.len().to_string());

    Ok(())
}

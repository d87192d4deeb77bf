//! Topic induction and the topic registry.
//!
//! Each video is assigned one short topic label; labels are deduplicated
//! semantically so near-synonymous labels collapse onto the existing one.

use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::create_client_with_base;
use crate::transcript::strip_timestamps;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The `video_id -> topic_label` registry, persisted as a CSV file.
///
/// Read-then-written without locking: on concurrent ingests the last
/// writer wins, which is acceptable because re-ingestion regenerates rows.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    path: PathBuf,
    entries: Vec<(String, String)>,
}

impl TopicRegistry {
    /// Load the registry, tolerating a missing file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            for line in content.lines().skip(1) {
                if let Some((video_id, topic)) = line.split_once(',') {
                    entries.push((video_id.trim().to_string(), topic.trim().to_string()));
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Unique topic labels, in first-seen order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for (_, topic) in &self.entries {
            if !labels.iter().any(|l| l == topic) {
                labels.push(topic.clone());
            }
        }
        labels
    }

    /// Topic assigned to a video, if any.
    pub fn topic_for(&self, video_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == video_id)
            .map(|(_, topic)| topic.as_str())
    }

    /// All registered `(video_id, topic)` rows.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Append a row and rewrite the file.
    pub fn append(&mut self, video_id: &str, topic: &str) -> Result<()> {
        self.entries
            .retain(|(id, _)| id != video_id);
        self.entries
            .push((video_id.to_string(), topic.to_string()));
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = String::from("video_id,video_topic\n");
        for (video_id, topic) in &self.entries {
            out.push_str(&format!("{},{}\n", video_id, topic));
        }

        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Build the transcript preview used in the labeling prompt: braces
/// stripped, whitespace normalized, cut at the last complete word.
pub fn build_preview(marked_text: &str, max_chars: usize) -> String {
    let plain = strip_timestamps(marked_text);
    let chars: Vec<char> = plain.chars().collect();

    if chars.len() <= max_chars {
        return plain;
    }

    let cut: String = chars[..max_chars].iter().collect();
    match cut.rfind(char::is_whitespace) {
        Some(boundary) => cut[..boundary].trim_end().to_string(),
        None => cut,
    }
}

/// Assigns a topic label per video, reusing prior labels when synonymous.
pub struct TopicInducer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    preview_chars: usize,
    prompts: Prompts,
}

impl TopicInducer {
    pub fn new(model: &str, preview_chars: usize, prompts: Prompts, api_base: Option<&str>) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            preview_chars,
            prompts,
        }
    }

    /// Induce a topic label for a video and reconcile it with the registry's
    /// existing labels.
    pub async fn induce(
        &self,
        title: &str,
        marked_transcript: &str,
        existing_labels: &[String],
    ) -> Result<String> {
        let preview = build_preview(marked_transcript, self.preview_chars);

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), title.to_string());
        vars.insert("preview".to_string(), preview);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.topic.label, &vars);
        let label = normalize_label(&self.complete(prompt).await?);

        if label.is_empty() {
            return Err(SkueError::ExtractionFailed(
                "Topic labeling returned an empty label".to_string(),
            ));
        }

        if existing_labels.is_empty() {
            return Ok(label);
        }

        let mut vars = HashMap::new();
        vars.insert("label".to_string(), label.clone());
        vars.insert("existing".to_string(), existing_labels.join(", "));

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.topic.dedup, &vars);
        let answer = normalize_label(&self.complete(prompt).await?);

        // Accept the answer only when it is one of the known labels or the
        // new label itself; anything else keeps the new label.
        let resolved = existing_labels
            .iter()
            .find(|l| l.eq_ignore_ascii_case(&answer))
            .cloned()
            .unwrap_or(label);

        debug!("Topic label resolved to '{}'", resolved);
        Ok(resolved)
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| SkueError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Topic request failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkueError::OpenAI("Empty topic response".to_string()))?;

        info!("Topic model answered: {}", content.trim());
        Ok(content.clone())
    }
}

/// First line of the answer, trimmed of quotes and surrounding whitespace.
fn normalize_label(answer: &str) -> String {
    answer
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_preview_cuts_at_word() {
        let marked = "{0.0} one two three four five";
        let preview = build_preview(marked, 13);
        assert_eq!(preview, "one two");
    }

    #[test]
    fn test_build_preview_short_input() {
        assert_eq!(build_preview("{1.0} short", 500), "short");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  \"Deep Learning\"  \nextra"), "Deep Learning");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_registry_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic_overview.csv");

        let mut registry = TopicRegistry::load(&path).unwrap();
        assert!(registry.labels().is_empty());

        registry.append("video000001", "machine learning").unwrap();
        registry.append("video000002", "statistics").unwrap();
        registry.append("video000003", "machine learning").unwrap();

        let reloaded = TopicRegistry::load(&path).unwrap();
        assert_eq!(reloaded.labels(), vec!["machine learning", "statistics"]);
        assert_eq!(reloaded.topic_for("video000002"), Some("statistics"));
        assert_eq!(reloaded.topic_for("missing"), None);
    }

    #[test]
    fn test_registry_replaces_existing_video_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic_overview.csv");

        let mut registry = TopicRegistry::load(&path).unwrap();
        registry.append("video000001", "old topic").unwrap();
        registry.append("video000001", "new topic").unwrap();

        let reloaded = TopicRegistry::load(&path).unwrap();
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.topic_for("video000001"), Some("new topic"));
    }
}

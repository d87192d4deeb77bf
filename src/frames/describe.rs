//! Vision-LLM captioning of retained frames.

use super::Frame;
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::{create_client_with_base, RequestPacer};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent, ImageDetail,
    ImageUrlArgs,
};
use async_openai::types::CreateChatCompletionRequestArgs;
use base64::Engine;
use std::path::Path;
use tracing::{debug, info, warn};

/// A captioned frame row, persisted as one CSV line.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescription {
    pub video_id: String,
    pub file_name: String,
    pub description: String,
    pub time_in_s: f64,
}

/// Captions frames with a vision model.
pub struct FrameDescriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
    pacer: RequestPacer,
}

impl FrameDescriber {
    pub fn new(
        model: &str,
        prompts: Prompts,
        api_base: Option<&str>,
        requests_per_pause: u32,
        pause_seconds: u64,
    ) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            prompts,
            pacer: RequestPacer::new(requests_per_pause, pause_seconds, api_base.is_none()),
        }
    }

    /// Caption every frame. A frame whose caption request fails gets an
    /// empty description rather than aborting the batch.
    pub async fn describe_frames(
        &mut self,
        video_id: &str,
        frames: &[Frame],
    ) -> Result<Vec<FrameDescription>> {
        let mut descriptions = Vec::with_capacity(frames.len());

        for frame in frames {
            self.pacer.tick().await;

            let description = match self.caption_frame(&frame.path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Caption failed for frame {}: {}", frame.index, e);
                    String::new()
                }
            };

            let file_name = frame
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            descriptions.push(FrameDescription {
                video_id: video_id.to_string(),
                file_name,
                description,
                time_in_s: frame.time_in_s,
            });
        }

        info!("Captioned {} frames", descriptions.len());
        Ok(descriptions)
    }

    async fn caption_frame(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let data_url = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let content = ChatCompletionRequestUserMessageContent::Array(vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(self.prompts.caption.user.clone())
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(data_url)
                        .detail(ImageDetail::Low)
                        .build()
                        .map_err(|e| SkueError::OpenAI(e.to_string()))?,
                )
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
        ]);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.caption.system.clone())
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.2)
            .build()
            .map_err(|e| SkueError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Caption request failed: {}", e)))?;

        let caption = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkueError::OpenAI("Empty caption response".to_string()))?;

        // Captions must stay a single plain block.
        let caption = caption.replace('\n', " ").trim().to_string();
        debug!("Captioned {:?} ({} chars)", path.file_name(), caption.len());
        Ok(caption)
    }
}

/// Write the caption rowset as a single CSV per video.
pub fn write_descriptions_csv(descriptions: &[FrameDescription], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = String::from("video_id,file_name,description,time_in_s\n");
    for d in descriptions {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_escape(&d.video_id),
            csv_escape(&d.file_name),
            csv_escape(&d.description),
            d.time_in_s
        ));
    }

    std::fs::write(path, out)?;
    Ok(())
}

/// Quote a CSV field when it contains a comma, quote, or newline.
pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_descriptions_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_descriptions.csv");

        let rows = vec![FrameDescription {
            video_id: "dQw4w9WgXcQ".to_string(),
            file_name: "frame0_0.jpg".to_string(),
            description: "A slide with a formula, labeled".to_string(),
            time_in_s: 0.0,
        }];

        write_descriptions_csv(&rows, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "video_id,file_name,description,time_in_s"
        );
        assert_eq!(
            lines.next().unwrap(),
            "dQw4w9WgXcQ,frame0_0.jpg,\"A slide with a formula, labeled\",0"
        );
    }
}

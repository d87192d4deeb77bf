//! Prompt templates for Skue.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub caption: CaptionPrompts,
    pub refine: RefinePrompts,
    pub chunking: ChunkingPrompts,
    pub topic: TopicPrompts,
    pub graph: GraphPrompts,
    pub router: RouterPrompts,
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for frame captioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionPrompts {
    pub system: String,
    pub user: String,
}

impl Default for CaptionPrompts {
    fn default() -> Self {
        Self {
            system: r#"You describe single still frames taken from educational videos.

Describe only the pedagogically relevant content: diagrams, formulas, code, charts, text on slides, demonstrations, and what they convey. Ignore decorative elements, channel branding, watermarks, progress bars, and the presenter's appearance unless it carries meaning.

Output exactly one plain block of sentences. No bullet points, no line breaks, no markdown, no headings."#
                .to_string(),
            user: "Describe the pedagogically relevant content of this frame.".to_string(),
        }
    }
}

/// Prompts for transcript refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinePrompts {
    pub system: String,
    pub user: String,
}

impl Default for RefinePrompts {
    fn default() -> Self {
        Self {
            system: r#"You repair raw speech-to-text transcripts.

The text contains timestamp tokens in curly braces, e.g. {12.34}. These tokens are load-bearing and MUST be preserved exactly as they appear, in their original positions relative to the surrounding words.

Correct grammar, capitalization, punctuation, and obvious mishearings. Do not paraphrase, do not summarize, do not add formatting, do not add or remove timestamp tokens. Return only the corrected text."#
                .to_string(),
            user: "Correct this transcript segment:\n\n{{segment}}".to_string(),
        }
    }
}

/// Prompts for LLM-directed chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingPrompts {
    pub system: String,
    pub user: String,
    pub subsplit_user: String,
}

impl Default for ChunkingPrompts {
    fn default() -> Self {
        Self {
            system: r#"You split video transcripts into logically coherent chunks.

The text contains timestamp tokens in curly braces, e.g. {12.34}. Preserve every token verbatim in its place.

Split the transcript at natural topic boundaries into chunks of roughly balanced size, at most {{chunk_max_length}} characters each. Join the chunks with the literal delimiter %%%% on its own. Do not add any other commentary or formatting."#
                .to_string(),
            user: "Split this transcript into chunks joined by %%%%:\n\n{{transcript}}".to_string(),
            subsplit_user: r#"The following chunk is too long (over {{chunk_max_length}} characters). Split it into smaller logical chunks joined by %%%%, preserving every curly-brace timestamp token verbatim:

{{chunk}}"#
                .to_string(),
        }
    }
}

/// Prompts for topic induction and label dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicPrompts {
    pub label: String,
    pub dedup: String,
}

impl Default for TopicPrompts {
    fn default() -> Self {
        Self {
            label: r#"Assign a single short topic label (1-3 words, lowercase) to a video.

Video title: {{title}}

Transcript opening:
{{preview}}

Answer with the topic label only, nothing else."#
                .to_string(),
            dedup: r#"A new video was labeled with the topic "{{label}}".

Existing topic labels: {{existing}}

If the new label is a near-synonym of one of the existing labels, answer with that existing label exactly as written. Otherwise answer with the new label exactly as written. Answer with the label only, nothing else."#
                .to_string(),
        }
    }
}

/// Prompts for graph entity/relationship extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphPrompts {
    pub system: String,
    pub user: String,
}

impl Default for GraphPrompts {
    fn default() -> Self {
        Self {
            system: r#"You extract machine-learning domain entities and relationships from lecture transcript chunks.

Entities are concrete ML concepts, methods, models, datasets, people, or tools mentioned in the text. Relationships are verbs connecting two extracted entities.

Output one item per line, strictly in one of these two shapes and nothing else:
Node: <Name>
Relationship: <Source>, <Type>, <Target>

Every relationship endpoint must also appear as a Node line. Do not output commentary, numbering, or markdown."#
                .to_string(),
            user: "Extract entities and relationships from this chunk:\n\n{{chunk}}".to_string(),
        }
    }
}

/// Prompts for logical routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterPrompts {
    pub logical: String,
}

impl Default for RouterPrompts {
    fn default() -> Self {
        Self {
            logical: r#"Classify which knowledge base a question belongs to.

Available subjects: {{subjects}}

{{history}}Question: {{question}}

Answer with exactly one subject from the list, and nothing else. If none fits, answer: other"#
                .to_string(),
        }
    }
}

/// Prompts for RAG answer generation, one template per routed subject area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub physics_system: String,
    pub math_system: String,
    pub fallback_system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            physics_system: r#"You are a physics tutor answering questions about lecture videos.

Ground every statement in the provided context passages. Walk through the physical reasoning step by step, name the laws and quantities involved, and say clearly when the context does not cover the question."#
                .to_string(),
            math_system: r#"You are a mathematics tutor answering questions about lecture videos.

Ground every statement in the provided context passages. Present derivations rigorously, define the symbols you use, and say clearly when the context does not cover the question."#
                .to_string(),
            fallback_system: r#"You are a helpful assistant answering questions about video content.

Answer using only the provided context passages. Cite the passage numbers you rely on. If the context does not contain the answer, say so clearly instead of guessing."#
                .to_string(),
            user: r#"Context:
{{context}}

Question: {{question}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            macro_rules! load_section {
                ($file:expr, $field:ident) => {
                    let path = custom_path.join($file);
                    if path.exists() {
                        let content = std::fs::read_to_string(&path)?;
                        prompts.$field = toml::from_str(&content)?;
                    }
                };
            }

            load_section!("caption.toml", caption);
            load_section!("refine.toml", refine);
            load_section!("chunking.toml", chunking);
            load_section!("topic.toml", topic);
            load_section!("graph.toml", graph);
            load_section!("router.toml", router);
            load_section!("rag.toml", rag);
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// System template for a routed subject area.
    pub fn rag_system_for(&self, template: &str) -> &str {
        match template {
            "physics" => &self.rag.physics_system,
            "math" => &self.rag.math_system,
            _ => &self.rag.fallback_system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.caption.system.is_empty());
        assert!(!prompts.chunking.system.is_empty());
        assert!(prompts.chunking.system.contains("%%%%"));
        assert!(!prompts.rag.fallback_system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Question: {{question}} ({{subjects}})";
        let mut vars = std::collections::HashMap::new();
        vars.insert("question".to_string(), "why".to_string());
        vars.insert("subjects".to_string(), "a, b".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Question: why (a, b)");
    }

    #[test]
    fn test_rag_system_for_falls_back() {
        let prompts = Prompts::default();
        assert_eq!(prompts.rag_system_for("physics"), prompts.rag.physics_system);
        assert_eq!(prompts.rag_system_for("unknown"), prompts.rag.fallback_system);
    }
}

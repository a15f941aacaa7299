use anyhow::Result;

use crate::models::EncodedImage;

/// Field the model is asked to fill in its JSON reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    Description,
    Answer,
}

impl OutputField {
    pub fn key(&self) -> &'static str {
        match self {
            OutputField::Description => "description",
            OutputField::Answer => "answer",
        }
    }
}

/// One structured request to a multimodal model.
#[derive(Debug, Clone)]
pub struct ModelPrompt {
    pub instruction: String,
    pub context: Option<String>,
    pub image: EncodedImage,
    pub output: OutputField,
}

impl ModelPrompt {
    /// Instruction, optional context and the reply format, as one text block.
    pub fn render_text(&self) -> String {
        let mut text = self.instruction.clone();
        if let Some(context) = &self.context {
            text.push_str("\n\n");
            text.push_str(context);
        }
        text.push_str(&format!(
            "\n\nRespond with a JSON object containing exactly one string field \"{}\".",
            self.output.key()
        ));
        text
    }
}

/// Trait for hosted vision models (OpenRouter, etc.)
///
/// Returns the model's structured reply. Checking that the declared output
/// field is present is left to the caller.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value>;
}

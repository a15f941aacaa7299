use std::sync::Arc;

use crate::error::WorkflowError;
use crate::models::EncodedImage;

use super::ai_service::{ModelPrompt, OutputField, VisionModel};

const DESCRIBE_INSTRUCTION: &str = "You are an AI vision expert. Please analyze the image and \
provide a description of the key objects and scenes in it.";

const ANSWER_INSTRUCTION: &str = "You are an AI assistant that answers questions about images. \
You are given an image and a list of detected objects in the image. You will use this \
information to answer the question about the image.";

/// Pull the declared string field out of a model reply.
fn required_field(reply: &serde_json::Value, field: OutputField) -> Result<String, WorkflowError> {
    match reply.get(field.key()).and_then(|v| v.as_str()).map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => {
            log::warn!("⚠️ Model reply is missing a non-empty \"{}\" field: {}", field.key(), reply);
            Err(WorkflowError::external(format!(
                "The model response did not contain a {}.",
                field.key()
            )))
        }
    }
}

async fn call_model(
    model: &dyn VisionModel,
    prompt: &ModelPrompt,
    what: &str,
) -> Result<String, WorkflowError> {
    let reply = model.generate(prompt).await.map_err(|e| {
        log::error!("❌ {} request failed: {:#}", what, e);
        WorkflowError::external(format!("{} failed: {}", what, e))
    })?;
    required_field(&reply, prompt.output)
}

/// Turns an image into a description of its key objects and scenes.
#[derive(Clone)]
pub struct ImageDescriptionService {
    model: Arc<dyn VisionModel>,
}

impl ImageDescriptionService {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub async fn describe(&self, image: &EncodedImage) -> Result<String, WorkflowError> {
        let prompt = ModelPrompt {
            instruction: DESCRIBE_INSTRUCTION.to_string(),
            context: None,
            image: image.clone(),
            output: OutputField::Description,
        };

        log::info!("📸 Requesting description for {} image ({} bytes)", image.mime_type(), image.byte_len());
        call_model(self.model.as_ref(), &prompt, "Image analysis").await
    }
}

/// Answers a question about an image, using an earlier description as context.
#[derive(Clone)]
pub struct ImageQaService {
    model: Arc<dyn VisionModel>,
}

impl ImageQaService {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub async fn answer(
        &self,
        image: &EncodedImage,
        description: &str,
        question: &str,
    ) -> Result<String, WorkflowError> {
        let prompt = ModelPrompt {
            instruction: ANSWER_INSTRUCTION.to_string(),
            context: Some(format!(
                "Question: {}\n\nDetected Objects: {}",
                question, description
            )),
            image: image.clone(),
            output: OutputField::Answer,
        };

        log::info!("❓ Requesting answer for question: {}", question);
        call_model(self.model.as_ref(), &prompt, "Question answering").await
    }
}

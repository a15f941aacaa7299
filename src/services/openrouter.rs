use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ai_service::{ModelPrompt, VisionModel};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

pub struct OpenRouterService {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &ModelPrompt) -> ChatRequest {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: prompt.render_text(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData {
                        url: prompt.image.as_data_url().to_string(),
                    },
                },
            ],
        }];

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: 800,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }

    /// Parse the assistant message into a JSON object.
    ///
    /// Models sometimes wrap JSON in a Markdown code fence even when asked
    /// not to, so a single surrounding fence is stripped first.
    fn parse_content(content: &str) -> Result<serde_json::Value> {
        let mut body = content.trim();
        if let Some(rest) = body.strip_prefix("```") {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            body = rest.strip_suffix("```").unwrap_or(rest).trim();
        }

        let value: serde_json::Value = serde_json::from_str(body)
            .with_context(|| {
                let preview: String = body.chars().take(200).collect();
                format!("model reply is not valid JSON: {}", preview)
            })?;

        if !value.is_object() {
            anyhow::bail!("model reply is not a JSON object");
        }
        Ok(value)
    }
}

#[async_trait::async_trait]
impl VisionModel for OpenRouterService {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value> {
        let request = self.build_request(prompt);
        let url = format!("{}/chat/completions", self.base_url);

        log::info!("🤖 Sending request to OpenRouter with model: {}", self.model);
        log::debug!(
            "📤 Image {} ({} bytes), expecting field \"{}\"",
            prompt.image.mime_type(),
            prompt.image.byte_len(),
            prompt.output.key()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/insight-lens")
            .header("X-Title", "InsightLens")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenRouter response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ OpenRouter API error ({}): {}", status, error_text);
            anyhow::bail!("OpenRouter API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenRouter returned no message content"))?;

        log::debug!("💬 OpenRouter response content: {}", content);
        Self::parse_content(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EncodedImage, ImageFile};
    use crate::services::ai_service::OutputField;

    fn service() -> OpenRouterService {
        OpenRouterService::new(
            "test_key".to_string(),
            "test_model".to_string(),
            "https://example.test/api/v1/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_content_plain_json() {
        let value = OpenRouterService::parse_content(r#"{"description": "a cat on a sofa"}"#).unwrap();
        assert_eq!(value["description"], "a cat on a sofa");
    }

    #[test]
    fn test_parse_content_fenced_json() {
        let content = "```json\n{\"answer\": \"red\"}\n```";
        let value = OpenRouterService::parse_content(content).unwrap();
        assert_eq!(value["answer"], "red");
    }

    #[test]
    fn test_parse_content_rejects_prose() {
        assert!(OpenRouterService::parse_content("The car is red.").is_err());
        assert!(OpenRouterService::parse_content("[\"red\"]").is_err());
    }

    #[test]
    fn test_build_request_embeds_image_and_format() {
        let service = service();
        assert_eq!(service.base_url, "https://example.test/api/v1");

        let image = EncodedImage::encode(&ImageFile::new("a.png", None, vec![0, 1, 2]));
        let prompt = ModelPrompt {
            instruction: "Describe.".to_string(),
            context: None,
            image,
            output: OutputField::Description,
        };

        let json = serde_json::to_value(service.build_request(&prompt)).unwrap();
        assert_eq!(json["model"], "test_model");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAEC"
        );
    }
}

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::NutritionAi;
use crate::config::AiConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Vision calls on large images can take a while.
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Detailed food-item breakdowns need room.
const VISION_MAX_TOKENS: u32 = 1500;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

/// Content is `Value` because vision messages mix text and image parts.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client backing [`NutritionAi`].
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("build ai http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("ai request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("ai request returned {}: {}", status, body));
        }

        let parsed: ChatResponse = resp.json().await.context("decode ai response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("ai response had no content"))?;

        debug!(chars = content.len(), "ai response received");
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl NutritionAi for OpenAiClient {
    #[instrument(skip_all)]
    async fn analyze_image(
        &self,
        system_prompt: &str,
        user_text: &str,
        image_data_url: &str,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(system_prompt.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: json!([
                        {"type": "text", "text": user_text},
                        {"type": "image_url", "image_url": {"url": image_data_url, "detail": "high"}},
                    ]),
                },
            ],
            max_tokens: Some(VISION_MAX_TOKENS),
            temperature: None,
            response_format: None,
        };
        self.complete(&request).await
    }

    #[instrument(skip_all)]
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(system_prompt.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: Value::String(user_prompt.to_string()),
                },
            ],
            max_tokens: None,
            temperature: Some(0.7),
            response_format: Some(json!({"type": "json_object"})),
        };
        self.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_mixed_content() {
        let request = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage {
                role: "user",
                content: json!([{"type": "text", "text": "hi"}]),
            }],
            max_tokens: Some(10),
            temperature: None,
            response_format: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn response_tolerates_missing_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}

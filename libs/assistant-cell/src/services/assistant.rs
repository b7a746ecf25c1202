use std::time::Duration;

use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::classifier::classify;
use crate::models::{AssistantError, AssistantReply, ChatHistory, Classification, ReplySource};
use crate::prompts::system_prompt;

pub const FALLBACK_MESSAGE: &str = "I'm sorry, I'm having trouble responding right now. \
Please try again in a moment. If this is a medical emergency, contact your local emergency services immediately.";

pub const NOT_CONFIGURED_MESSAGE: &str = "The AI assistant is not configured yet. \
Please ask an administrator to add a valid OpenAI API key.";

/// Proxies a conversation to an OpenAI-compatible chat completion endpoint.
/// Never fails: upstream problems turn into [`FALLBACK_MESSAGE`].
pub struct AssistantService {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    configured: bool,
}

impl AssistantService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http_client: Client::new(),
            api_key: config.openai_api_key.trim().to_string(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            timeout: Duration::from_secs(config.ai_timeout_seconds),
            configured: config.is_ai_configured(),
        }
    }

    pub async fn respond(&self, message: &str, history: &ChatHistory) -> AssistantReply {
        let classification = classify(message);
        debug!("Assistant message classified as {:?} (urgent: {})", classification.category, classification.urgent);

        if !self.configured {
            warn!("OpenAI API key missing or placeholder, assistant disabled");
            return reply(NOT_CONFIGURED_MESSAGE.to_string(), classification, ReplySource::NotConfigured);
        }

        let messages = build_messages(&classification, history, message);

        let outcome = match tokio::time::timeout(self.timeout, self.complete(messages)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(text) => {
                info!("Assistant completion returned {} characters", text.len());
                reply(text, classification, ReplySource::Completion)
            }
            Err(e) => {
                error!("Assistant completion failed: {}", e);
                reply(FALLBACK_MESSAGE.to_string(), classification, ReplySource::Fallback)
            }
        }
    }

    async fn complete(&self, messages: Vec<Value>) -> Result<String, AssistantError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
        });

        let response = self.http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream(format!("{}: {}", status, error_text)));
        }

        let completion: Value = response.json().await
            .map_err(|e| AssistantError::InvalidResponse(e.to_string()))?;

        completion["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AssistantError::InvalidResponse("missing choices[0].message.content".to_string()))
    }
}

/// `[system, history..., user]` in the chat completion wire shape.
pub fn build_messages(classification: &Classification, history: &ChatHistory, message: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(json!({ "role": "system", "content": system_prompt(classification) }));
    messages.extend(
        history.turns().map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content })),
    );
    messages.push(json!({ "role": "user", "content": message }));
    messages
}

fn reply(text: String, classification: Classification, source: ReplySource) -> AssistantReply {
    AssistantReply {
        reply: text,
        category: classification.category,
        urgent: classification.urgent,
        source,
    }
}

//! docqa-complete
//!
//! Completion collaborator over an OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::config::{api_key_from_env, CompletionSettings};
use docqa_core::error::{is_transient_status, Error, Result};
use docqa_core::traits::{CompletionClient, CompletionRequest};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, model: String, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()).trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn from_settings(settings: &CompletionSettings) -> Result<Self> {
        let api_key = api_key_from_env(&settings.api_key_env)?;
        Ok(Self::new(api_key, settings.model.clone(), settings.endpoint.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

/// Content of the first choice, trimmed of surrounding whitespace.
fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::completion("response has no message content", false))
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| Error::completion(format!("request to {url} failed: {e}"), e.is_timeout() || e.is_connect()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::completion(
                format!("chat API error {status}: {body}"),
                is_transient_status(status.as_u16()),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::completion(format!("malformed chat response: {e}"), false))?;
        tracing::debug!(model = %self.model, "completion received");
        first_choice(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_system_then_user() {
        let client = OpenAiChatClient::new("k".into(), "gpt-4o-mini".into(), Some("http://localhost:9000/v1/".into()));
        assert_eq!(client.endpoint, "http://localhost:9000/v1");
        let req = CompletionRequest { system: "sys".into(), prompt: "hi".into(), temperature: 0.2, max_tokens: 16 };
        let json = serde_json::to_value(client.body(&req)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 16);
    }

    #[test]
    fn first_choice_is_trimmed() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"  42\n"}}]}"#).unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "42");
    }

    #[test]
    fn empty_choices_is_fatal() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(parsed), Err(Error::Completion { transient: false, .. })));
    }
}

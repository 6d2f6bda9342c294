//! Minimal OpenAI-compatible client.
//!
//! We only call chat.completions with a single user message and plain-text output.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{provider_error_message, LlmClient, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::error::LlmError;

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl OpenAI {
  pub fn new(client: reqwest::Client, api_key: String, base_url: &str, model: &str) -> Self {
    Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() }
  }
}

#[async_trait]
impl LlmClient for OpenAI {
  #[instrument(level = "info", target = "llm", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: &self.model,
      messages: vec![ChatMessageReq { role: "user", content: prompt }],
      temperature: TEMPERATURE,
      max_tokens: MAX_OUTPUT_TOKENS,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| LlmError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = provider_error_message(&body).unwrap_or(body);
      return Err(LlmError::Api { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::Http(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .filter(|t| !t.trim().is_empty())
      .ok_or(LlmError::EmptyCompletion)?;
    info!(target: "llm", elapsed = ?start.elapsed(), text_len = text.len(), "OpenAI response received");
    Ok(text)
  }

  fn describe(&self) -> String {
    format!("openai:{}", self.model)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessageReq<'a>>,
  temperature: f32,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq<'a> { role: &'a str, content: &'a str }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_carries_fixed_generation_parameters() {
    let req = ChatCompletionRequest {
      model: "gpt-4o-mini",
      messages: vec![ChatMessageReq { role: "user", content: "prompt" }],
      temperature: TEMPERATURE,
      max_tokens: MAX_OUTPUT_TOKENS,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["max_tokens"], 4096);
    assert_eq!(v["messages"][0]["role"], "user");
    assert_eq!(v["messages"][0]["content"], "prompt");
  }

  #[test]
  fn response_with_null_content_parses() {
    let body: ChatCompletionResponse =
      serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
    assert!(body.choices[0].message.content.is_none());
  }
}

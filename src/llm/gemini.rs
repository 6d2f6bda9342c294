//! Gemini REST client (`models/{model}:generateContent`).
//!
//! The key travels in the `x-goog-api-key` header rather than the query string
//! so request URLs are safe to log.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{provider_error_message, LlmClient, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::error::LlmError;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl Gemini {
  pub fn new(client: reqwest::Client, api_key: String, base_url: &str, model: &str) -> Self {
    Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() }
  }

  fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.base_url, self.model)
  }
}

#[async_trait]
impl LlmClient for Gemini {
  #[instrument(level = "info", target = "llm", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
    let req = GenerateContentRequest {
      contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
      generation_config: GenerationConfig { temperature: TEMPERATURE, max_output_tokens: MAX_OUTPUT_TOKENS },
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(self.endpoint())
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(&req)
      .send()
      .await
      .map_err(|e| LlmError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = provider_error_message(&body).unwrap_or(body);
      return Err(LlmError::Api { status: status.as_u16(), message });
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| LlmError::Http(e.to_string()))?;
    if let Some(usage) = &body.usage_metadata {
      info!(target: "llm", prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = completion_text(body).ok_or(LlmError::EmptyCompletion)?;
    info!(target: "llm", elapsed = ?start.elapsed(), text_len = text.len(), "Gemini response received");
    Ok(text)
  }

  fn describe(&self) -> String {
    format!("gemini:{}", self.model)
  }
}

/// Concatenate the text parts of the first candidate.
fn completion_text(body: GenerateContentResponse) -> Option<String> {
  let content = body.candidates.into_iter().next()?.content?;
  let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
  if text.trim().is_empty() { None } else { Some(text) }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content<'a> { role: &'a str, parts: Vec<Part<'a>> }
#[derive(Serialize)]
struct Part<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig { temperature: f32, max_output_tokens: u32 }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<PartResponse> }
#[derive(Deserialize)]
struct PartResponse { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_uses_generation_config_names() {
    let req = GenerateContentRequest {
      contents: vec![Content { role: "user", parts: vec![Part { text: "hi" }] }],
      generation_config: GenerationConfig { temperature: TEMPERATURE, max_output_tokens: MAX_OUTPUT_TOKENS },
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 4096);
    assert!((v["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
  }

  #[test]
  fn joins_parts_of_first_candidate() {
    let body: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\":"},{"text":"1}]"}],"role":"model"}},{"content":{"parts":[{"text":"ignored"}]}}]}"#,
    )
    .unwrap();
    assert_eq!(completion_text(body).as_deref(), Some("[{\"a\":1}]"));
  }

  #[test]
  fn blocked_or_empty_candidates_yield_nothing() {
    let blocked: GenerateContentResponse = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
    assert!(completion_text(blocked).is_none());
    let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap();
    assert!(completion_text(empty).is_none());
  }

  #[test]
  fn endpoint_trims_trailing_slash() {
    let g = Gemini::new(reqwest::Client::new(), "k".into(), "https://example.test/v1beta/", "gemini-2.0-flash");
    assert_eq!(g.endpoint(), "https://example.test/v1beta/models/gemini-2.0-flash:generateContent");
  }
}

//! Inference provider clients.
//!
//! Every call is a single request/response with fixed generation parameters:
//! no retry, no streaming, no client-side timeout. The client is built once at
//! startup and shared through `AppState`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{LlmSettings, Provider};
use crate::error::LlmError;

pub mod gemini;
pub mod openai;

pub use gemini::Gemini;
pub use openai::OpenAI;

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

const USER_AGENT_VALUE: &str = "study-quiz/0.1";

/// Prompt in, completion text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
  async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

  /// Short provider/model label for logs.
  fn describe(&self) -> String;
}

/// Build the configured client, or None when no credential is set.
pub fn build_client(settings: &LlmSettings) -> Option<Arc<dyn LlmClient>> {
  let api_key = settings.api_key.clone()?;
  let client = match reqwest::Client::builder().user_agent(USER_AGENT_VALUE).build() {
    Ok(c) => c,
    Err(e) => {
      error!(target: "llm", error = %e, provider = ?settings.provider, "Failed to build HTTP client; inference disabled.");
      return None;
    }
  };
  let llm: Arc<dyn LlmClient> = match settings.provider {
    Provider::Gemini => Arc::new(Gemini::new(client, api_key, &settings.base_url, &settings.model)),
    Provider::OpenAi => Arc::new(OpenAI::new(client, api_key, &settings.base_url, &settings.model)),
  };
  info!(target: "llm", client = %llm.describe(), "Inference enabled.");
  Some(llm)
}

/// Pull `error.message` out of a provider error body (both providers use that shape).
pub(crate) fn provider_error_message(body: &str) -> Option<String> {
  #[derive(serde::Deserialize)]
  struct EWrap { error: EObj }
  #[derive(serde::Deserialize)]
  struct EObj { message: Option<String> }
  serde_json::from_str::<EWrap>(body).ok()?.error.message
}

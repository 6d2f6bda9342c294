//! Study Quiz · document-to-quiz backend
//!
//! - Axum HTTP + WebSocket API
//! - PDF / DOCX / PPTX text extraction
//! - Gemini (default) or OpenAI-compatible inference via environment variables
//! - Static SPA fallback ($STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   LLM_PROVIDER     : "gemini" (default) or "openai"
//!   GEMINI_API_KEY   : enables Gemini inference if present
//!   GEMINI_MODEL     : default "gemini-2.0-flash"
//!   GEMINI_BASE_URL  : default "https://generativelanguage.googleapis.com/v1beta"
//!   OPENAI_API_KEY   : enables OpenAI inference when LLM_PROVIDER=openai
//!   OPENAI_BASE_URL  : default "https://api.openai.com/v1"
//!   OPENAI_MODEL     : default "gpt-4o-mini"
//!   MAX_UPLOAD_BYTES : request body limit (default 25 MiB)
//!   STATIC_DIR       : SPA directory (default "./static")
//!   QUIZ_CONFIG_PATH : path to TOML config overriding the prompt templates
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod extract;
mod llm;
mod quiz_parser;
mod pipeline;
mod session;
mod review;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Settings, prompt templates and the inference client are built once here.
  let settings = Settings::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let state = Arc::new(AppState::new(settings));

  // Build the HTTP router with routes, body limit, CORS and tracing layers.
  let app = build_router(state.clone());

  let listener = TcpListener::bind(addr).await?;
  info!(target: "study_quiz", %addr, inference = state.llm.as_ref().map(|c| c.describe()).unwrap_or_else(|| "disabled".into()), "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}

//! Application state: settings, prompt templates, the inference client and the extractor.
//!
//! Everything here is read-only after startup; per-user progress lives in the
//! `StudyFlow` owned by each WebSocket connection.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{Prompts, Settings};
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::llm::{build_client, LlmClient};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub prompts: Prompts,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl AppState {
    /// Build state from settings: construct the inference client once and hand it out from here.
    #[instrument(level = "info", skip_all)]
    pub fn new(settings: Settings) -> Self {
        let llm = build_client(&settings.llm);
        if llm.is_none() && settings.llm.api_key.is_none() {
            warn!(target: "study_quiz", provider = ?settings.llm.provider, "No inference credential set; quiz generation will fail until one is configured.");
        }
        info!(target: "study_quiz", port = settings.port, max_upload_bytes = settings.max_upload_bytes, static_dir = %settings.static_dir, "Settings loaded");
        let prompts = settings.prompts.clone();
        Self { settings, prompts, llm, extractor: Arc::new(DocumentExtractor) }
    }

    /// Assemble state from explicit parts (tests substitute stubs here).
    pub fn with_parts(settings: Settings, llm: Option<Arc<dyn LlmClient>>, extractor: Arc<dyn TextExtractor>) -> Self {
        let prompts = settings.prompts.clone();
        Self { settings, prompts, llm, extractor }
    }
}

//! Pipeline controller: file selection → extraction → quiz generation → parsed quiz.
//!
//! Every external call happens at most once per `generate`; there is no retry.
//! A failure parks the pipeline in `Failed` with one message, and the only way
//! out is a full restart.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{DocumentKind, Quiz, UploadedFile};
use crate::error::{ErrorKind, LlmError, PipelineError};
use crate::extract::TextExtractor;
use crate::llm::LlmClient;
use crate::quiz_parser::parse_quiz;
use crate::util::file_stem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    /// A file is staged and waiting for `generate`.
    Uploading,
    Extracting,
    AwaitingGeneration,
    QuizReady,
    Failed,
}

/// Failure recorded when the pipeline enters `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

pub struct Pipeline {
    state: PipelineState,
    file: Option<UploadedFile>,
    quiz: Option<Quiz>,
    failure: Option<Failure>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self { state: PipelineState::Idle, file: None, quiz: None, failure: None }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    /// "<file stem> Quiz", or just "Quiz" when no named file is staged.
    pub fn quiz_title(&self) -> String {
        match self.file.as_ref().map(|f| file_stem(&f.name)).filter(|s| !s.is_empty()) {
            Some(stem) => format!("{stem} Quiz"),
            None => "Quiz".to_string(),
        }
    }

    /// Stage a file. The declared type is checked against the allow-list
    /// before anything else happens; a rejected file never reaches the extractor.
    #[instrument(level = "info", target = "upload", skip(self, file), fields(name = %file.name, media_type = %file.media_type, len = file.bytes.len()))]
    pub fn select_file(&mut self, file: UploadedFile) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Idle | PipelineState::Uploading => {}
            PipelineState::Failed => self.restart(),
            other => {
                warn!(target: "upload", state = ?other, "File selected while a quiz is active; restarting");
                self.restart();
            }
        }

        if DocumentKind::detect(&file.media_type, &file.name).is_none() {
            // The name stays visible so the UI can show what was rejected.
            self.file = Some(file);
            return Err(self.fail(PipelineError::UnsupportedFileType));
        }
        self.file = Some(file);
        self.state = PipelineState::Uploading;
        Ok(())
    }

    /// Run extraction, generation and parsing for the staged file.
    #[instrument(level = "info", target = "quiz", skip_all)]
    pub async fn generate(
        &mut self,
        extractor: &dyn TextExtractor,
        llm: Option<&Arc<dyn LlmClient>>,
        prompts: &Prompts,
    ) -> Result<&Quiz, PipelineError> {
        // A parked failure stays the reported one until restart.
        if self.state == PipelineState::Failed {
            return Err(PipelineError::MissingFile);
        }
        let staged = if self.state == PipelineState::Uploading { self.file.clone() } else { None };
        let Some(file) = staged else {
            return Err(self.fail(PipelineError::MissingFile));
        };

        self.state = PipelineState::Extracting;
        let text = match extractor.extract(file.bytes, &file.media_type, &file.name).await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(e.into())),
        };
        info!(target: "upload", name = %file.name, text_len = text.len(), "Document text extracted");

        self.state = PipelineState::AwaitingGeneration;
        let Some(llm) = llm else {
            return Err(self.fail(LlmError::MissingCredential.into()));
        };
        let completion = match llm.complete(&prompts.quiz(&text)).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e.into())),
        };

        match parse_quiz(&completion) {
            Ok(quiz) => {
                info!(target: "quiz", questions = quiz.len(), "Quiz ready");
                self.state = PipelineState::QuizReady;
                Ok(&*self.quiz.insert(quiz))
            }
            Err(e) => {
                error!(target: "quiz", reason = %e.reason, raw = %crate::util::trunc_for_log(&e.raw, 400), "Generated quiz rejected");
                Err(self.fail(e.into()))
            }
        }
    }

    /// Full restart: file, quiz and failure are all dropped.
    pub fn restart(&mut self) {
        *self = Self::new();
    }

    fn fail(&mut self, e: PipelineError) -> PipelineError {
        warn!(target: "quiz", kind = ?e.kind(), error = %e, "Pipeline failed");
        self.state = PipelineState::Failed;
        self.quiz = None;
        self.failure = Some(Failure { kind: e.kind(), message: e.to_string() });
        e
    }
}

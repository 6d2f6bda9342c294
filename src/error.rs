//! Error types for every stage of the study flow.
//!
//! Each stage has its own enum; `StudyError` is what crosses the HTTP/WS
//! boundary and carries a machine-readable `ErrorKind` next to the message.

use serde::Serialize;
use thiserror::Error;

/// Machine-readable error discriminant exposed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFileType,
    MissingFile,
    ExtractionFailure,
    InferenceFailure,
    QuizFormatError,
    ExplanationUnavailable,
    InvalidAction,
    InvalidRequest,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Failed to process file: {0}")]
    ExtractionFailure(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not set")]
    MissingCredential,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Empty completion from provider")]
    EmptyCompletion,
}

/// Malformed or schema-invalid model output. `raw` is the untouched
/// completion and is only ever logged, never shown to the user.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct QuizFormatError {
    pub reason: String,
    pub raw: String,
}

impl QuizFormatError {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self { reason: reason.into(), raw: raw.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported file format. Please upload a PDF, DOCX, PPT, or PPTX file.")]
    UnsupportedFileType,
    #[error("Please select or drop a file to upload.")]
    MissingFile,
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("Quiz generation failed: {0}")]
    Inference(#[from] LlmError),
    #[error(transparent)]
    QuizFormat(#[from] QuizFormatError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedFileType => ErrorKind::UnsupportedFileType,
            PipelineError::MissingFile => ErrorKind::MissingFile,
            PipelineError::Extract(ExtractError::UnsupportedFileType(_)) => ErrorKind::UnsupportedFileType,
            PipelineError::Extract(ExtractError::ExtractionFailure(_)) => ErrorKind::ExtractionFailure,
            PipelineError::Inference(_) => ErrorKind::InferenceFailure,
            PipelineError::QuizFormat(_) => ErrorKind::QuizFormatError,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Answer the current question before moving on.")]
    Unanswered,
    #[error("Already at the last question; submit the quiz instead.")]
    AtLastQuestion,
    #[error("Submit is only available on the last question.")]
    NotLastQuestion,
    #[error("Every question needs an answer before submitting.")]
    IncompleteAnswers,
    #[error("'{0}' is not one of the options for this question.")]
    UnknownOption(String),
    #[error("The quiz has already been submitted.")]
    AlreadySubmitted,
}

/// Error surfaced to a client: a kind plus one flat human-readable message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StudyError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StudyError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAction, message)
    }
}

impl From<PipelineError> for StudyError {
    fn from(e: PipelineError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<SessionError> for StudyError {
    fn from(e: SessionError) -> Self {
        Self::invalid_action(e.to_string())
    }
}

impl From<LlmError> for StudyError {
    fn from(e: LlmError) -> Self {
        Self::new(ErrorKind::InferenceFailure, e.to_string())
    }
}

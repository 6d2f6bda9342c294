//! Domain models: uploaded documents, quiz questions, answers and results.

use serde::{Deserialize, Serialize};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPT: &str = "application/vnd.ms-powerpoint";
pub const MIME_PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Placeholder stored in a result item when its explanation could not be generated.
pub const EXPLANATION_UNAVAILABLE: &str = "Explanation unavailable.";

/// The four document types the upload form accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
  Pdf,
  Docx,
  Ppt,
  Pptx,
}

impl DocumentKind {
  pub fn from_mime(mime: &str) -> Option<Self> {
    // Content types may carry parameters, e.g. "application/pdf; charset=binary".
    let base = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match base.as_str() {
      MIME_PDF => Some(Self::Pdf),
      MIME_DOCX => Some(Self::Docx),
      MIME_PPT => Some(Self::Ppt),
      MIME_PPTX => Some(Self::Pptx),
      _ => None,
    }
  }

  pub fn from_extension(name: &str) -> Option<Self> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
      "pdf" => Some(Self::Pdf),
      "docx" => Some(Self::Docx),
      "ppt" => Some(Self::Ppt),
      "pptx" => Some(Self::Pptx),
      _ => None,
    }
  }

  /// Resolve the kind from the declared MIME type. Browsers often send an
  /// empty or generic type for Office files, in which case the extension decides.
  pub fn detect(mime: &str, file_name: &str) -> Option<Self> {
    let generic = mime.trim().is_empty() || mime.trim().eq_ignore_ascii_case("application/octet-stream");
    if generic {
      Self::from_extension(file_name)
    } else {
      Self::from_mime(mime)
    }
  }
}

/// A file the user picked or dropped. Lives until replaced or the flow restarts.
#[derive(Clone)]
pub struct UploadedFile {
  pub name: String,
  pub media_type: String,
  pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UploadedFile")
      .field("name", &self.name)
      .field("media_type", &self.media_type)
      .field("len", &self.bytes.len())
      .finish()
  }
}

/// One multiple-choice question. `correct_option` is always one of `options`
/// once the question has gone through the quiz parser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  #[serde(rename = "correctOption")]
  pub correct_option: String,
}

impl QuizQuestion {
  pub fn has_option(&self, option: &str) -> bool {
    self.options.iter().any(|o| o == option)
  }
}

pub type Quiz = Vec<QuizQuestion>;

/// Per-question outcome shown during review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResultItem {
  pub question: String,
  pub selected: String,
  pub correct: String,
  pub explanation: String,
}

impl QuizResultItem {
  pub fn is_correct(&self) -> bool {
    self.selected == self.correct
  }
}

/// What a submission produces: the score plus one result item per question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
  pub score: usize,
  pub results: Vec<QuizResultItem>,
}

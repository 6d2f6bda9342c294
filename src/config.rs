//! Runtime settings (environment) and prompt templates (optional TOML override).
//!
//! See `Settings::from_env` for the variables read and `Prompts` for the TOML schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::QuizQuestion;
use crate::util::fill_template;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
  Gemini,
  OpenAi,
}

/// Inference provider credentials and endpoints. The key is server-side only.
#[derive(Clone)]
pub struct LlmSettings {
  pub provider: Provider,
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
}

impl std::fmt::Debug for LlmSettings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LlmSettings")
      .field("provider", &self.provider)
      .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .finish()
  }
}

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub max_upload_bytes: usize,
  pub static_dir: String,
  pub llm: LlmSettings,
  pub prompts: Prompts,
}

impl Settings {
  /// Read every setting from the process environment.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Same as `from_env` but over an arbitrary lookup, so tests need not touch the real environment.
  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let port = get("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(DEFAULT_PORT);
    let max_upload_bytes = get("MAX_UPLOAD_BYTES")
      .and_then(|v| v.parse::<usize>().ok())
      .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
    let static_dir = get("STATIC_DIR").unwrap_or_else(|| "./static".into());

    let provider = match get("LLM_PROVIDER").as_deref().map(str::trim) {
      Some(p) if p.eq_ignore_ascii_case("openai") => Provider::OpenAi,
      Some(p) if !p.is_empty() && !p.eq_ignore_ascii_case("gemini") => {
        error!(target: "study_quiz", provider = %p, "Unknown LLM_PROVIDER; falling back to gemini");
        Provider::Gemini
      }
      _ => Provider::Gemini,
    };
    let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
    let llm = match provider {
      Provider::Gemini => LlmSettings {
        provider,
        api_key: non_empty("GEMINI_API_KEY"),
        base_url: non_empty("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
        model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
      },
      Provider::OpenAi => LlmSettings {
        provider,
        api_key: non_empty("OPENAI_API_KEY"),
        base_url: non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
        model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
      },
    };

    let prompts = get("QUIZ_CONFIG_PATH")
      .and_then(|path| load_quiz_config(&path))
      .map(|c| c.prompts)
      .unwrap_or_default();

    Self { port, max_upload_bytes, static_dir, llm, prompts }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates sent to the inference provider.
///
/// `quiz_template` receives `{content}`; `explanation_template` receives
/// `{question}`, `{options}`, `{selected}` and `{correct}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quiz_template: String,
  pub explanation_template: String,
}

impl Prompts {
  /// Quiz-generation prompt: fixed instructions followed by the extracted text verbatim.
  pub fn quiz(&self, content: &str) -> String {
    fill_template(&self.quiz_template, &[("content", content)])
  }

  pub fn explanation(&self, question: &QuizQuestion, selected: &str) -> String {
    let options = question.options.join(", ");
    fill_template(
      &self.explanation_template,
      &[
        ("question", question.question.as_str()),
        ("options", options.as_str()),
        ("selected", selected),
        ("correct", question.correct_option.as_str()),
      ],
    )
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quiz_template: DEFAULT_QUIZ_TEMPLATE.into(),
      explanation_template: DEFAULT_EXPLANATION_TEMPLATE.into(),
    }
  }
}

const DEFAULT_QUIZ_TEMPLATE: &str = r#"Generate a multiple-choice quiz strictly based on the exact content provided below. Follow these instructions precisely to ensure accuracy and prevent hallucinations:

Respond ONLY with a valid JSON array of question objects. No additional text, explanations, or formatting.

Each question object must have this exact structure and key names (case-sensitive):
{
  "question": "What is the question?",
  "options": ["option 1", "option 2", "option 3", "option 4"],
  "correctOption": "option 1"
}

Important:
1. Return ONLY the JSON array, no other text.
2. Each question must have exactly 4 distinct options.
3. The correctOption must match one of the options exactly.
4. Generate 10 - 20 questions based on the content.
5. Ensure the questions are relevant and accurate to the content.
6. Do not include any additional text or explanations.
7. Do not use any other format or structure.
8. Do not include any metadata or comments.
9. All questions and options must be based exclusively on the provided content, with no assumptions, extrapolations, or outside knowledge.
10. Avoid repeating questions or options.

Content to analyze:
{content}"#;

const DEFAULT_EXPLANATION_TEMPLATE: &str = "Question: {question}\nOptions: {options}\nSelected: {selected}\nCorrect: {correct}\nProvide a clear, concise explanation for the correct answer. Limit your explanation to 100 words or fewer. Do not use special characters like \"**\" or \"[]\", and avoid any additional text or formatting.";

/// Load `QuizConfig` from a TOML file. On any IO/parse error, logs and returns None.
pub fn load_quiz_config(path: &str) -> Option<QuizConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<QuizConfig>(&s) {
      Ok(cfg) => {
        info!(target: "study_quiz", %path, "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "study_quiz", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "study_quiz", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

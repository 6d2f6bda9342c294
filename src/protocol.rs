//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Quiz, QuizResultItem};
use crate::error::{ErrorKind, StudyError};
use crate::pipeline::PipelineState;
use crate::review::ReviewCard;
use crate::session::ForwardAction;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SelectFile {
        name: String,
        #[serde(default)]
        mime: String,
        #[serde(rename = "dataBase64")]
        data_base64: String,
    },
    Generate,
    SelectOption {
        option: String,
    },
    Next,
    Previous,
    Submit,
    ReviewNext,
    ReviewPrevious,
    Key {
        key: String,
    },
    Finish,
    Restart,
}

impl ClientWsMessage {
    /// Wire tag, for logging without the (possibly large) payload.
    pub fn name(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::SelectFile { .. } => "select_file",
            ClientWsMessage::Generate => "generate",
            ClientWsMessage::SelectOption { .. } => "select_option",
            ClientWsMessage::Next => "next",
            ClientWsMessage::Previous => "previous",
            ClientWsMessage::Submit => "submit",
            ClientWsMessage::ReviewNext => "review_next",
            ClientWsMessage::ReviewPrevious => "review_previous",
            ClientWsMessage::Key { .. } => "key",
            ClientWsMessage::Finish => "finish",
            ClientWsMessage::Restart => "restart",
        }
    }

    /// Long-running actions get a `busy` message before they start.
    pub fn busy_action(&self) -> Option<BusyAction> {
        match self {
            ClientWsMessage::Generate => Some(BusyAction::GeneratingQuiz),
            ClientWsMessage::Submit => Some(BusyAction::Submitting),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyAction {
    GeneratingQuiz,
    Submitting,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Busy { action: BusyAction },
    View { view: ViewOut },
    Error { kind: ErrorKind, message: String },
}

impl From<StudyError> for ServerWsMessage {
    fn from(e: StudyError) -> Self {
        ServerWsMessage::Error { kind: e.kind, message: e.message }
    }
}

/// Snapshot of whatever screen the study flow is on.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ViewOut {
    Upload {
        state: PipelineState,
        #[serde(rename = "fileName")]
        file_name: Option<String>,
        error: Option<ErrorBody>,
    },
    Quiz {
        title: String,
        index: usize,
        total: usize,
        question: String,
        options: Vec<String>,
        selected: String,
        answered: Vec<bool>,
        forward: ForwardAction,
        #[serde(rename = "canGoBack")]
        can_go_back: bool,
        #[serde(rename = "canAdvance")]
        can_advance: bool,
        #[serde(rename = "canSubmit")]
        can_submit: bool,
    },
    Review {
        title: String,
        card: ReviewCard,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct UploadOut {
    pub content: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// `{ "error": { "message": … } }`, optionally with a `kind`.
#[derive(Serialize)]
pub struct ErrorOut {
    pub error: ErrorBody,
}

impl ErrorOut {
    pub fn message(message: impl Into<String>) -> Self {
        Self { error: ErrorBody { kind: None, message: message.into() } }
    }

    pub fn kinded(e: &StudyError) -> Self {
        Self { error: ErrorBody { kind: Some(e.kind), message: e.message.clone() } }
    }
}

#[derive(Deserialize)]
pub struct GeminiIn {
    pub prompt: String,
}
#[derive(Serialize)]
pub struct GeminiOut {
    pub text: String,
}
/// `/api/gemini` reports errors as a bare string.
#[derive(Serialize)]
pub struct GeminiErrorOut {
    pub error: String,
}

#[derive(Deserialize)]
pub struct QuizIn {
    pub content: String,
}
#[derive(Serialize)]
pub struct QuizOut {
    pub quiz: Quiz,
}

#[derive(Deserialize)]
pub struct ReviewIn {
    pub quiz: Quiz,
    pub answers: Vec<String>,
}
#[derive(Serialize)]
pub struct ReviewOut {
    pub score: usize,
    pub results: Vec<QuizResultItem>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub inference: bool,
}

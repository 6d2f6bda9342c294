//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - The per-connection study flow (upload → quiz → review → restart)
//!   - Stateless quiz generation and review used by the HTTP API

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{Quiz, QuizOutcome, UploadedFile};
use crate::error::{ErrorKind, LlmError, StudyError};
use crate::pipeline::Pipeline;
use crate::protocol::{ClientWsMessage, ErrorBody, ViewOut};
use crate::quiz_parser::parse_quiz;
use crate::review::{Review, ReviewKey, ReviewStep};
use crate::session::{explain_answers, QuizSession};
use crate::state::AppState;

enum Phase {
  Upload(Pipeline),
  Quiz { title: String, session: QuizSession },
  Review { title: String, review: Review },
}

/// One user's walk through upload, quiz and review. Owned by a single
/// WebSocket connection, so events are applied one at a time.
pub struct StudyFlow {
  pub id: Uuid,
  phase: Phase,
}

impl Default for StudyFlow {
  fn default() -> Self {
    Self::new()
  }
}

impl StudyFlow {
  pub fn new() -> Self {
    Self { id: Uuid::new_v4(), phase: Phase::Upload(Pipeline::new()) }
  }

  /// Back to the upload screen with all transient state dropped.
  pub fn restart(&mut self) {
    info!(target: "quiz", flow = %self.id, "Study flow restarted");
    self.phase = Phase::Upload(Pipeline::new());
  }

  /// Apply one client event. Errors leave the flow in a consistent state
  /// (a failed upload stays visible on the upload screen).
  #[instrument(level = "info", skip_all, fields(flow = %self.id, event = msg.name()))]
  pub async fn handle(&mut self, msg: ClientWsMessage, state: &AppState) -> Result<(), StudyError> {
    match msg {
      ClientWsMessage::Ping => Ok(()),
      ClientWsMessage::Restart => {
        self.restart();
        Ok(())
      }

      ClientWsMessage::SelectFile { name, mime, data_base64 } => {
        let Phase::Upload(pipeline) = &mut self.phase else {
          return Err(StudyError::invalid_action("Exit the current quiz before uploading another file."));
        };
        let bytes = BASE64_STANDARD
          .decode(data_base64.trim())
          .map_err(|e| StudyError::new(ErrorKind::InvalidRequest, format!("File payload is not valid base64: {e}")))?;
        pipeline.select_file(UploadedFile { name, media_type: mime, bytes })?;
        Ok(())
      }

      ClientWsMessage::Generate => {
        let Phase::Upload(pipeline) = &mut self.phase else {
          return Err(StudyError::invalid_action("A quiz is already in progress."));
        };
        let quiz = pipeline.generate(state.extractor.as_ref(), state.llm.as_ref(), &state.prompts).await?.clone();
        let title = pipeline.quiz_title();
        info!(target: "quiz", flow = %self.id, questions = quiz.len(), %title, "Quiz started");
        self.phase = Phase::Quiz { title, session: QuizSession::new(Arc::new(quiz)) };
        Ok(())
      }

      ClientWsMessage::SelectOption { option } => {
        self.session()?.select_option(&option)?;
        Ok(())
      }
      ClientWsMessage::Next => {
        self.session()?.next()?;
        Ok(())
      }
      ClientWsMessage::Previous => {
        self.session()?.previous()?;
        Ok(())
      }

      ClientWsMessage::Submit => {
        let Phase::Quiz { title, session } = &mut self.phase else {
          return Err(StudyError::invalid_action("There is no quiz to submit."));
        };
        let outcome = session.submit(state.llm.as_ref(), &state.prompts).await?;
        info!(target: "review", flow = %self.id, score = outcome.score, total = outcome.results.len(), "Quiz submitted");
        let review = Review::new(session.quiz().clone(), outcome);
        self.phase = Phase::Review { title: std::mem::take(title), review };
        Ok(())
      }

      ClientWsMessage::ReviewNext => {
        if self.review()?.advance() == ReviewStep::Finished {
          self.restart();
        }
        Ok(())
      }
      ClientWsMessage::Finish => {
        self.review()?;
        self.restart();
        Ok(())
      }
      ClientWsMessage::ReviewPrevious => {
        self.review()?.previous();
        Ok(())
      }
      ClientWsMessage::Key { key } => {
        if let Phase::Review { review, .. } = &mut self.phase {
          review.on_key(ReviewKey::from_dom(&key));
        } else {
          debug!(target: "quiz", flow = %self.id, %key, "Key ignored outside review");
        }
        Ok(())
      }
    }
  }

  fn session(&mut self) -> Result<&mut QuizSession, StudyError> {
    match &mut self.phase {
      Phase::Quiz { session, .. } => Ok(session),
      _ => Err(StudyError::invalid_action("No quiz is in progress.")),
    }
  }

  fn review(&mut self) -> Result<&mut Review, StudyError> {
    match &mut self.phase {
      Phase::Review { review, .. } => Ok(review),
      _ => Err(StudyError::invalid_action("There are no results to review.")),
    }
  }

  /// Serializable snapshot of the current screen.
  pub fn view(&self) -> ViewOut {
    match &self.phase {
      Phase::Upload(pipeline) => ViewOut::Upload {
        state: pipeline.state(),
        file_name: pipeline.file().map(|f| f.name.clone()),
        error: pipeline.failure().map(|f| ErrorBody { kind: Some(f.kind), message: f.message.clone() }),
      },
      Phase::Quiz { title, session } => {
        let q = session.current_question();
        ViewOut::Quiz {
          title: title.clone(),
          index: session.current_index(),
          total: session.quiz().len(),
          question: q.question.clone(),
          options: q.options.clone(),
          selected: session.answers()[session.current_index()].clone(),
          answered: session.answers().iter().map(|a| !a.is_empty()).collect(),
          forward: session.forward_action(),
          can_go_back: session.current_index() > 0,
          can_advance: session.can_advance(),
          can_submit: session.can_submit(),
        }
      }
      Phase::Review { title, review } => ViewOut::Review { title: title.clone(), card: review.card() },
    }
  }
}

/// Stateless quiz generation from already-extracted text (`/api/quiz`).
#[instrument(level = "info", skip(state, content), fields(content_len = content.len()))]
pub async fn generate_quiz(state: &AppState, content: &str) -> Result<Quiz, StudyError> {
  let llm = state.llm.as_ref().ok_or(LlmError::MissingCredential)?;
  let completion = llm.complete(&state.prompts.quiz(content)).await?;
  parse_quiz(&completion).map_err(|e| {
    tracing::error!(target: "quiz", reason = %e.reason, raw = %crate::util::trunc_for_log(&e.raw, 400), "Generated quiz rejected");
    StudyError::new(ErrorKind::QuizFormatError, e.reason)
  })
}

/// Stateless scoring + explanations (`/api/review`).
#[instrument(level = "info", skip_all, fields(questions = quiz.len()))]
pub async fn review_answers(state: &AppState, quiz: &Quiz, answers: &[String]) -> Result<QuizOutcome, StudyError> {
  if quiz.is_empty() || answers.len() != quiz.len() {
    return Err(StudyError::new(
      ErrorKind::InvalidRequest,
      format!("Expected {} answers, got {}", quiz.len(), answers.len()),
    ));
  }
  Ok(explain_answers(quiz, answers, state.llm.as_ref(), &state.prompts).await)
}

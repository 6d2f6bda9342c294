//! Quiz session: answering questions one at a time, then submitting.
//!
//! Forward navigation is gated on the current slot being answered; going back
//! is always allowed. Submission scores the answers and fetches one
//! explanation per question, strictly one request in flight at a time.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Quiz, QuizOutcome, QuizQuestion, QuizResultItem, EXPLANATION_UNAVAILABLE};
use crate::error::{ErrorKind, SessionError};
use crate::llm::LlmClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum SessionPhase {
    AnsweringQuestion(usize),
    Submitting,
    ReviewReady,
}

/// What the forward control does on the current question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardAction {
    Next,
    Submit,
}

/// Number of index-aligned positions where the answer equals the correct option.
pub fn score(quiz: &[QuizQuestion], answers: &[String]) -> usize {
    quiz.iter().zip(answers).filter(|(q, a)| **a == q.correct_option).count()
}

pub struct QuizSession {
    quiz: Arc<Quiz>,
    answers: Vec<String>,
    current: usize,
    phase: SessionPhase,
}

impl QuizSession {
    /// Fresh session with every answer slot empty. `quiz` must be non-empty,
    /// which the quiz parser guarantees.
    pub fn new(quiz: Arc<Quiz>) -> Self {
        let answers = vec![String::new(); quiz.len()];
        Self { quiz, answers, current: 0, phase: SessionPhase::AnsweringQuestion(0) }
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &QuizQuestion {
        &self.quiz[self.current]
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.quiz.len()
    }

    pub fn forward_action(&self) -> ForwardAction {
        if self.is_last() { ForwardAction::Submit } else { ForwardAction::Next }
    }

    pub fn can_advance(&self) -> bool {
        !self.is_last() && !self.answers[self.current].is_empty()
    }

    pub fn can_submit(&self) -> bool {
        self.is_last() && self.answers.iter().all(|a| !a.is_empty())
    }

    /// Record (or overwrite) the answer for the current question without moving.
    pub fn select_option(&mut self, option: &str) -> Result<(), SessionError> {
        self.ensure_answering()?;
        if !self.current_question().has_option(option) {
            return Err(SessionError::UnknownOption(option.to_string()));
        }
        self.answers[self.current] = option.to_string();
        Ok(())
    }

    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.ensure_answering()?;
        if self.is_last() {
            return Err(SessionError::AtLastQuestion);
        }
        if self.answers[self.current].is_empty() {
            return Err(SessionError::Unanswered);
        }
        self.move_to(self.current + 1);
        Ok(self.current)
    }

    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.ensure_answering()?;
        self.move_to(self.current.saturating_sub(1));
        Ok(self.current)
    }

    /// Score the answers, then ask for an explanation of every question in
    /// order. A failed explanation degrades only its own item.
    #[instrument(level = "info", target = "quiz", skip_all, fields(questions = self.quiz.len()))]
    pub async fn submit(&mut self, llm: Option<&Arc<dyn LlmClient>>, prompts: &Prompts) -> Result<QuizOutcome, SessionError> {
        self.ensure_answering()?;
        if !self.is_last() {
            return Err(SessionError::NotLastQuestion);
        }
        if !self.can_submit() {
            return Err(SessionError::IncompleteAnswers);
        }

        self.phase = SessionPhase::Submitting;
        let outcome = explain_answers(&self.quiz, &self.answers, llm, prompts).await;
        self.phase = SessionPhase::ReviewReady;
        Ok(outcome)
    }

    fn ensure_answering(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::AnsweringQuestion(_) => Ok(()),
            _ => Err(SessionError::AlreadySubmitted),
        }
    }

    fn move_to(&mut self, index: usize) {
        self.current = index;
        self.phase = SessionPhase::AnsweringQuestion(index);
    }
}

/// Per-item fallback: logged under `ExplanationUnavailable`, never raised.
fn unavailable(idx: usize, reason: impl std::fmt::Display) -> String {
    warn!(target: "quiz", question = idx, kind = ?ErrorKind::ExplanationUnavailable, %reason, "Using explanation placeholder");
    EXPLANATION_UNAVAILABLE.to_string()
}

/// Score plus sequential per-question explanations. Also backs the stateless
/// `/api/review` endpoint. Without a client every explanation is the placeholder.
pub async fn explain_answers(
    quiz: &[QuizQuestion],
    answers: &[String],
    llm: Option<&Arc<dyn LlmClient>>,
    prompts: &Prompts,
) -> QuizOutcome {
    let score = score(quiz, answers);
    info!(target: "quiz", score, total = quiz.len(), "Quiz scored");

    let mut results = Vec::with_capacity(quiz.len());
    for (idx, q) in quiz.iter().enumerate() {
        let selected = answers.get(idx).cloned().unwrap_or_default();
        let explanation = match llm {
            Some(llm) => match llm.complete(&prompts.explanation(q, &selected)).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => unavailable(idx, "empty completion"),
                Err(e) => unavailable(idx, &e),
            },
            None => unavailable(idx, "no inference client"),
        };
        results.push(QuizResultItem {
            question: q.question.clone(),
            selected,
            correct: q.correct_option.clone(),
            explanation,
        });
    }

    QuizOutcome { score, results }
}


#[cfg(test)]
mod tests {
    use super::fixtures::quiz;
    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::ScriptedLlm;

    fn answer_all(s: &mut QuizSession, pick: impl Fn(usize) -> String) {
        for i in 0..s.quiz().len() {
            s.select_option(&pick(i)).unwrap();
            if i + 1 < s.quiz().len() {
                s.next().unwrap();
            }
        }
    }

    #[test]
    fn starts_on_first_question_with_empty_answers() {
        let s = QuizSession::new(quiz(3));
        assert_eq!(s.phase(), SessionPhase::AnsweringQuestion(0));
        assert!(s.answers().iter().all(String::is_empty));
        assert_eq!(s.forward_action(), ForwardAction::Next);
    }

    #[test]
    fn next_is_blocked_until_answered() {
        let mut s = QuizSession::new(quiz(3));
        assert!(!s.can_advance());
        assert_eq!(s.next(), Err(SessionError::Unanswered));
        assert_eq!(s.current_index(), 0);

        s.select_option("0-c").unwrap();
        assert!(s.can_advance());
        assert_eq!(s.next(), Ok(1));
    }

    #[test]
    fn reselecting_overwrites_without_advancing() {
        let mut s = QuizSession::new(quiz(2));
        s.select_option("0-b").unwrap();
        s.select_option("0-d").unwrap();
        assert_eq!(s.answers()[0], "0-d");
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut s = QuizSession::new(quiz(2));
        assert_eq!(s.select_option("1-a"), Err(SessionError::UnknownOption("1-a".into())));
        assert!(s.answers()[0].is_empty());
    }

    #[test]
    fn previous_is_ungated_and_floored() {
        let mut s = QuizSession::new(quiz(3));
        assert_eq!(s.previous(), Ok(0));
        s.select_option("0-a").unwrap();
        s.next().unwrap();
        // Question 1 is unanswered, going back is still fine.
        assert_eq!(s.previous(), Ok(0));
        assert_eq!(s.answers()[0], "0-a");
    }

    #[test]
    fn last_question_turns_forward_into_submit() {
        let mut s = QuizSession::new(quiz(2));
        s.select_option("0-a").unwrap();
        s.next().unwrap();
        assert!(s.is_last());
        assert_eq!(s.forward_action(), ForwardAction::Submit);
        s.select_option("1-b").unwrap();
        assert_eq!(s.next(), Err(SessionError::AtLastQuestion));
        assert!(s.can_submit());
    }

    #[test]
    fn score_counts_index_aligned_matches() {
        let q = quiz(4);
        let answers: Vec<String> = vec!["0-a".into(), "1-b".into(), "2-a".into(), "".into()];
        assert_eq!(score(&q, &answers), 2);
        // Shifted answers do not count.
        let shifted: Vec<String> = vec!["1-a".into(), "0-a".into(), "3-a".into(), "2-a".into()];
        assert_eq!(score(&q, &shifted), 0);
    }

    #[tokio::test]
    async fn seven_of_ten_scores_seven() {
        let mut s = QuizSession::new(quiz(10));
        answer_all(&mut s, |i| if i < 7 { format!("{i}-a") } else { format!("{i}-c") });
        let replies: Vec<String> = (0..10).map(|i| format!("Because {i}.")).collect();
        let scripted = Arc::new(ScriptedLlm::replying(&replies.iter().map(String::as_str).collect::<Vec<_>>()));
        let llm: Arc<dyn LlmClient> = scripted.clone();

        let outcome = s.submit(Some(&llm), &Prompts::default()).await.unwrap();
        assert_eq!(outcome.score, 7);
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.results[9].explanation, "Because 9.");
        assert_eq!(s.phase(), SessionPhase::ReviewReady);
        assert_eq!(scripted.calls(), 10);
    }

    #[tokio::test]
    async fn explanations_are_requested_in_question_order() {
        let mut s = QuizSession::new(quiz(3));
        answer_all(&mut s, |i| format!("{i}-b"));
        let scripted = Arc::new(ScriptedLlm::replying(&["x", "y", "z"]));
        let llm: Arc<dyn LlmClient> = scripted.clone();
        s.submit(Some(&llm), &Prompts::default()).await.unwrap();

        let prompts = scripted.prompts.lock().unwrap();
        for (i, p) in prompts.iter().enumerate() {
            assert!(p.starts_with(&format!("Question: Question {i}?\n")));
            assert!(p.contains(&format!("Selected: {i}-b\nCorrect: {i}-a")));
        }
    }

    #[tokio::test]
    async fn one_failed_explanation_degrades_only_its_item() {
        let mut s = QuizSession::new(quiz(3));
        answer_all(&mut s, |i| format!("{i}-a"));
        let scripted = Arc::new(ScriptedLlm::new(vec![
            Ok("first".into()),
            Err(LlmError::Http("connection reset".into())),
            Ok("  third  ".into()),
        ]));
        let llm: Arc<dyn LlmClient> = scripted.clone();

        let outcome = s.submit(Some(&llm), &Prompts::default()).await.unwrap();
        let explanations: Vec<&str> = outcome.results.iter().map(|r| r.explanation.as_str()).collect();
        assert_eq!(explanations, vec!["first", EXPLANATION_UNAVAILABLE, "third"]);
        assert_eq!(outcome.score, 3);
    }

    #[tokio::test]
    async fn submit_requires_every_answer_and_the_last_question() {
        let mut s = QuizSession::new(quiz(2));
        s.select_option("0-a").unwrap();
        assert_eq!(s.submit(None, &Prompts::default()).await, Err(SessionError::NotLastQuestion));
        s.next().unwrap();
        assert!(!s.can_submit());
        assert_eq!(s.submit(None, &Prompts::default()).await, Err(SessionError::IncompleteAnswers));
        assert_eq!(s.phase(), SessionPhase::AnsweringQuestion(1));
    }

    #[tokio::test]
    async fn submitted_session_is_frozen() {
        let mut s = QuizSession::new(quiz(1));
        s.select_option("0-a").unwrap();
        let outcome = s.submit(None, &Prompts::default()).await.unwrap();
        assert!(outcome.results.iter().all(|r| r.explanation == EXPLANATION_UNAVAILABLE));
        assert_eq!(s.select_option("0-b"), Err(SessionError::AlreadySubmitted));
        assert_eq!(s.previous(), Err(SessionError::AlreadySubmitted));
        assert_eq!(s.answers()[0], "0-a");
    }
}

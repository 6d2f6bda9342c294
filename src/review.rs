//! Review presenter: browse the submitted quiz one result at a time.
//!
//! Navigation is free in both directions and clamped to bounds. On the last
//! item the forward control becomes "Finish", which ends the study flow.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Quiz, QuizOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionMark {
    /// The correct option, whether or not it was picked.
    Correct,
    /// Picked by the user but wrong.
    WrongPick,
    Neither,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewForward {
    Next,
    Finish,
}

/// Result of pressing the forward control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewStep {
    Moved(usize),
    Finished,
}

/// Keys the review screen reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewKey {
    ArrowLeft,
    ArrowRight,
    Other,
}

impl ReviewKey {
    /// Map a DOM `KeyboardEvent.key` value.
    pub fn from_dom(key: &str) -> Self {
        match key {
            "ArrowLeft" => Self::ArrowLeft,
            "ArrowRight" => Self::ArrowRight,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarkedOption {
    pub text: String,
    pub mark: OptionMark,
    pub selected: bool,
}

/// Everything needed to render one review screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReviewCard {
    pub index: usize,
    pub total: usize,
    pub score: usize,
    pub question: String,
    pub options: Vec<MarkedOption>,
    pub is_correct: bool,
    pub selected: String,
    pub correct: String,
    pub explanation: String,
    pub forward: ReviewForward,
}

pub struct Review {
    quiz: Arc<Quiz>,
    outcome: QuizOutcome,
    cursor: usize,
}

impl Review {
    /// `outcome.results` is index-aligned with `quiz` and non-empty.
    pub fn new(quiz: Arc<Quiz>, outcome: QuizOutcome) -> Self {
        Self { quiz, outcome, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn last_index(&self) -> usize {
        self.outcome.results.len().saturating_sub(1)
    }

    pub fn forward_action(&self) -> ReviewForward {
        if self.cursor >= self.last_index() { ReviewForward::Finish } else { ReviewForward::Next }
    }

    pub fn next(&mut self) -> usize {
        self.cursor = (self.cursor + 1).min(self.last_index());
        self.cursor
    }

    pub fn previous(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    /// Arrow keys mirror the Previous/Next controls; other keys do nothing.
    pub fn on_key(&mut self, key: ReviewKey) -> usize {
        match key {
            ReviewKey::ArrowLeft => self.previous(),
            ReviewKey::ArrowRight => self.next(),
            ReviewKey::Other => self.cursor,
        }
    }

    /// The forward control: next item, or `Finished` on the last one.
    pub fn advance(&mut self) -> ReviewStep {
        match self.forward_action() {
            ReviewForward::Next => ReviewStep::Moved(self.next()),
            ReviewForward::Finish => ReviewStep::Finished,
        }
    }

    pub fn card(&self) -> ReviewCard {
        let item = &self.outcome.results[self.cursor];
        let options = self
            .quiz
            .get(self.cursor)
            .map(|q| q.options.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|opt| {
                let selected = *opt == item.selected;
                let mark = if *opt == item.correct {
                    OptionMark::Correct
                } else if selected {
                    OptionMark::WrongPick
                } else {
                    OptionMark::Neither
                };
                MarkedOption { text: opt.clone(), mark, selected }
            })
            .collect();

        ReviewCard {
            index: self.cursor,
            total: self.outcome.results.len(),
            score: self.outcome.score,
            question: item.question.clone(),
            options,
            is_correct: item.is_correct(),
            selected: item.selected.clone(),
            correct: item.correct.clone(),
            explanation: item.explanation.clone(),
            forward: self.forward_action(),
        }
    }
}

//! Turns a raw quiz-generation completion into a validated `Quiz`.
//!
//! Model output is untrusted. Parsing runs in two stages that are tested on
//! their own: `strip_code_fence` removes a Markdown fence around the payload,
//! then `extract_array_span` narrows the text to the first `[` .. last `]`.
//! The candidate is parsed as JSON and every question is checked; one bad
//! question rejects the whole quiz.

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::{Quiz, QuizQuestion};
use crate::error::QuizFormatError;

pub const OPTIONS_PER_QUESTION: usize = 4;

const FENCE: &str = "```";

/// Stage 1: trim, and if the text opens with a Markdown fence (with or without
/// a language tag on the same line) drop the opening fence line and a closing fence.
pub fn strip_code_fence(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(after_open) = trimmed.strip_prefix(FENCE) else {
    return trimmed;
  };
  // The language tag runs to the end of the first line. A single-line fence
  // ("```[...]```") has no tag: only a run of letters directly after the fence is one.
  let body = match after_open.find('\n') {
    Some(nl) => &after_open[nl + 1..],
    None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
  };
  body.trim_end().strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Stage 2: the span from the first `[` to the last `]`, inclusive, when both
/// exist in that order; otherwise the whole input.
pub fn extract_array_span(text: &str) -> &str {
  match (text.find('['), text.rfind(']')) {
    (Some(start), Some(end)) if start < end => &text[start..=end],
    _ => text,
  }
}

/// Full parse: fence stripping, array extraction, JSON decoding and schema validation.
#[instrument(level = "debug", target = "quiz", skip(raw), fields(raw_len = raw.len()))]
pub fn parse_quiz(raw: &str) -> Result<Quiz, QuizFormatError> {
  let candidate = extract_array_span(strip_code_fence(raw));
  let value: Value = serde_json::from_str(candidate).map_err(|e| {
    warn!(target: "quiz", error = %e, raw = %crate::util::trunc_for_log(raw, 400), "Model output is not valid JSON");
    QuizFormatError::new("Failed to parse AI response as JSON", raw)
  })?;

  let items = match value {
    Value::Array(items) => items,
    _ => return Err(QuizFormatError::new("Expected array of questions", raw)),
  };
  if items.is_empty() {
    return Err(QuizFormatError::new("The generated quiz has no questions", raw));
  }

  items
    .iter()
    .enumerate()
    .map(|(idx, item)| {
      validate_question(item).map_err(|why| {
        warn!(target: "quiz", question = idx, %why, "Rejecting generated quiz");
        QuizFormatError::new(format!("Quiz format is invalid (question {}: {})", idx + 1, why), raw)
      })
    })
    .collect()
}

fn validate_question(item: &Value) -> Result<QuizQuestion, &'static str> {
  let obj = item.as_object().ok_or("not an object")?;

  let question = obj
    .get("question")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .ok_or("missing question text")?;

  let options = obj.get("options").and_then(Value::as_array).ok_or("missing options")?;
  if options.len() != OPTIONS_PER_QUESTION {
    return Err("expected exactly 4 options");
  }
  let options: Vec<String> = options
    .iter()
    .map(|o| o.as_str().map(str::to_string))
    .collect::<Option<_>>()
    .ok_or("options must be strings")?;

  let correct_option = obj
    .get("correctOption")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .ok_or("missing correctOption")?;
  if !options.iter().any(|o| o == correct_option) {
    return Err("correctOption is not one of the options");
  }

  Ok(QuizQuestion { question: question.to_string(), options, correct_option: correct_option.to_string() })
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARIS: &str = r#"[{"question":"What is the capital of France?","options":["Paris","Lyon","Nice","Marseille"],"correctOption":"Paris"}]"#;

  fn one(question: &str, options: &[&str], correct: &str) -> String {
    serde_json::json!([{ "question": question, "options": options, "correctOption": correct }]).to_string()
  }

  #[test]
  fn fence_with_language_tag() {
    assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
  }

  #[test]
  fn fence_without_language_tag() {
    assert_eq!(strip_code_fence("  ```\n[1]\n```  \n"), "[1]");
  }

  #[test]
  fn single_line_fence() {
    assert_eq!(strip_code_fence("```[1]```"), "[1]");
    assert_eq!(strip_code_fence("```json[1]```"), "[1]");
  }

  #[test]
  fn unterminated_fence_keeps_body() {
    assert_eq!(strip_code_fence("```json\n[1]"), "[1]");
  }

  #[test]
  fn unfenced_text_is_only_trimmed() {
    assert_eq!(strip_code_fence("  Here you go: [1]  "), "Here you go: [1]");
  }

  #[test]
  fn array_span_is_first_open_to_last_close() {
    assert_eq!(extract_array_span("Sure! [[1], [2]] hope that helps ]"), "[[1], [2]] hope that helps ]");
    assert_eq!(extract_array_span("prefix [1,2] suffix"), "[1,2]");
  }

  #[test]
  fn array_span_falls_back_to_whole_text() {
    assert_eq!(extract_array_span("{\"a\": 1}"), "{\"a\": 1}");
    assert_eq!(extract_array_span("] backwards ["), "] backwards [");
  }

  #[test]
  fn parses_fenced_paris_quiz() {
    let raw = format!("```json\n{PARIS}\n```");
    let quiz = parse_quiz(&raw).unwrap();
    assert_eq!(quiz.len(), 1);
    assert_eq!(quiz[0].question, "What is the capital of France?");
    assert_eq!(quiz[0].options, vec!["Paris", "Lyon", "Nice", "Marseille"]);
    assert_eq!(quiz[0].correct_option, "Paris");
  }

  #[test]
  fn parses_plain_fence_and_surrounding_chatter() {
    assert_eq!(parse_quiz(&format!("```\n{PARIS}\n```")).unwrap().len(), 1);
    assert_eq!(parse_quiz(&format!("Here is your quiz:\n{PARIS}\nGood luck!")).unwrap().len(), 1);
  }

  #[test]
  fn every_accepted_question_has_its_answer_among_options() {
    let raw = serde_json::json!([
      { "question": "A?", "options": ["1", "2", "3", "4"], "correctOption": "3" },
      { "question": "B?", "options": ["w", "x", "y", "z"], "correctOption": "w" },
    ])
    .to_string();
    let quiz = parse_quiz(&raw).unwrap();
    assert!(quiz.iter().all(|q| q.options.contains(&q.correct_option)));
  }

  #[test]
  fn rejects_non_array_top_level() {
    let err = parse_quiz(r#"{"question":"Q"}"#).unwrap_err();
    assert_eq!(err.reason, "Expected array of questions");
    let err = parse_quiz(r#""just a sentence""#).unwrap_err();
    assert_eq!(err.reason, "Expected array of questions");
  }

  #[test]
  fn bare_object_narrows_to_its_inner_array() {
    // First `[` to last `]` picks the options list out of a lone question object.
    let raw = r#"{"question":"Q","options":["a","b","c","d"],"correctOption":"a"}"#;
    assert_eq!(extract_array_span(raw), r#"["a","b","c","d"]"#);
    let err = parse_quiz(raw).unwrap_err();
    assert_eq!(err.reason, "Quiz format is invalid (question 1: not an object)");
  }

  #[test]
  fn rejects_invalid_json_and_keeps_raw() {
    let err = parse_quiz("I cannot help with that.").unwrap_err();
    assert_eq!(err.reason, "Failed to parse AI response as JSON");
    assert_eq!(err.raw, "I cannot help with that.");
  }

  #[test]
  fn rejects_missing_fields() {
    assert!(parse_quiz(r#"[{"options":["a","b","c","d"],"correctOption":"a"}]"#).is_err());
    assert!(parse_quiz(r#"[{"question":"Q","correctOption":"a"}]"#).is_err());
    assert!(parse_quiz(r#"[{"question":"Q","options":["a","b","c","d"]}]"#).is_err());
    assert!(parse_quiz(&one("", &["a", "b", "c", "d"], "a")).is_err());
  }

  #[test]
  fn rejects_wrong_option_count() {
    assert!(parse_quiz(&one("Q", &["a", "b", "c"], "a")).is_err());
    assert!(parse_quiz(&one("Q", &["a", "b", "c", "d", "e"], "a")).is_err());
  }

  #[test]
  fn rejects_answer_not_verbatim_in_options() {
    let err = parse_quiz(&one("Q", &["Paris", "Lyon", "Nice", "Marseille"], "paris")).unwrap_err();
    assert!(err.reason.contains("question 1"));
    assert!(parse_quiz(&one("Q", &["Paris", "Lyon", "Nice", "Marseille"], "Paris ")).is_err());
  }

  #[test]
  fn one_bad_question_rejects_the_whole_quiz() {
    let raw = serde_json::json!([
      { "question": "A?", "options": ["1", "2", "3", "4"], "correctOption": "3" },
      { "question": "B?", "options": ["w", "x", "y"], "correctOption": "w" },
    ])
    .to_string();
    let err = parse_quiz(&raw).unwrap_err();
    assert!(err.reason.contains("question 2"));
  }

  #[test]
  fn rejects_empty_array_and_non_string_options() {
    assert!(parse_quiz("[]").is_err());
    assert!(parse_quiz(r#"[{"question":"Q","options":[1,2,3,4],"correctOption":"1"}]"#).is_err());
  }
}

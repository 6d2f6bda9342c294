//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{multipart::MultipartRejection, Multipart, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument, warn};

use crate::domain::DocumentKind;
use crate::error::{ErrorKind, ExtractError, StudyError};
use crate::logic::{generate_quiz, review_answers};
use crate::protocol::*;
use crate::state::AppState;

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::UnsupportedFileType | ErrorKind::MissingFile | ErrorKind::InvalidAction | ErrorKind::InvalidRequest => {
      StatusCode::BAD_REQUEST
    }
    ErrorKind::QuizFormatError => StatusCode::BAD_GATEWAY,
    ErrorKind::ExtractionFailure | ErrorKind::InferenceFailure | ErrorKind::ExplanationUnavailable => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}

fn kinded_error(e: &StudyError) -> Response {
  (status_for(e.kind), Json(ErrorOut::kinded(e))).into_response()
}

fn plain_error(status: StatusCode, message: &str) -> Response {
  (status, Json(ErrorOut::message(message))).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, inference: state.llm.is_some() })
}

/// Multipart upload with a single `file` field; responds with the extracted text.
#[instrument(level = "info", skip_all)]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Response {
  let mut multipart = match multipart {
    Ok(m) => m,
    Err(e) => {
      warn!(target: "upload", error = %e, "Upload is not a multipart form");
      return plain_error(StatusCode::BAD_REQUEST, "No file provided");
    }
  };

  let mut upload = None;
  loop {
    match multipart.next_field().await {
      Ok(Some(field)) if field.name() == Some("file") => {
        let name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        match field.bytes().await {
          Ok(bytes) => {
            upload = Some((name, mime, bytes));
            break;
          }
          Err(e) => {
            warn!(target: "upload", error = %e, "Failed to read file field");
            return plain_error(e.status(), &e.body_text());
          }
        }
      }
      Ok(Some(_)) => continue,
      Ok(None) => break,
      Err(e) => {
        warn!(target: "upload", error = %e, "Malformed multipart body");
        return plain_error(e.status(), &e.body_text());
      }
    }
  }

  let Some((name, mime, bytes)) = upload else {
    return plain_error(StatusCode::BAD_REQUEST, "No file provided");
  };
  info!(target: "upload", %name, %mime, len = bytes.len(), "File received");

  if DocumentKind::detect(&mime, &name).is_none() {
    return plain_error(StatusCode::BAD_REQUEST, "Unsupported file type");
  }

  match state.extractor.extract(bytes.to_vec(), &mime, &name).await {
    Ok(content) => {
      info!(target: "upload", %name, text_len = content.len(), "Text extracted");
      Json(UploadOut { content }).into_response()
    }
    Err(ExtractError::UnsupportedFileType(reason)) => {
      info!(target: "upload", %name, %reason, "Upload type has no extractor");
      plain_error(StatusCode::BAD_REQUEST, "Unsupported file type")
    }
    Err(e) => {
      error!(target: "upload", %name, error = %e, "Extraction failed");
      plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process file")
    }
  }
}

/// Raw prompt passthrough. Errors are a bare string, not an object.
#[instrument(level = "info", skip(state, body), fields(prompt_len = body.prompt.len()))]
pub async fn http_post_gemini(State(state): State<Arc<AppState>>, Json(body): Json<GeminiIn>) -> Response {
  let Some(llm) = state.llm.as_ref() else {
    return (StatusCode::INTERNAL_SERVER_ERROR, Json(GeminiErrorOut { error: "API key not set".into() })).into_response();
  };
  match llm.complete(&body.prompt).await {
    Ok(text) => Json(GeminiOut { text }).into_response(),
    Err(e) => {
      error!(target: "llm", provider = %llm.describe(), error = %e, "Prompt passthrough failed");
      (StatusCode::INTERNAL_SERVER_ERROR, Json(GeminiErrorOut { error: "Gemini API error".into() })).into_response()
    }
  }
}

#[instrument(level = "info", skip(state, body), fields(content_len = body.content.len()))]
pub async fn http_post_quiz(State(state): State<Arc<AppState>>, Json(body): Json<QuizIn>) -> Response {
  match generate_quiz(&state, &body.content).await {
    Ok(quiz) => {
      info!(target: "quiz", questions = quiz.len(), "HTTP quiz generated");
      Json(QuizOut { quiz }).into_response()
    }
    Err(e) => kinded_error(&e),
  }
}

#[instrument(level = "info", skip(state, body), fields(questions = body.quiz.len(), answers = body.answers.len()))]
pub async fn http_post_review(State(state): State<Arc<AppState>>, Json(body): Json<ReviewIn>) -> Response {
  match review_answers(&state, &body.quiz, &body.answers).await {
    Ok(outcome) => {
      info!(target: "review", score = outcome.score, total = outcome.results.len(), "HTTP review served");
      Json(ReviewOut { score: outcome.score, results: outcome.results }).into_response()
    }
    Err(e) => kinded_error(&e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Settings;
  use crate::domain::{EXPLANATION_UNAVAILABLE, MIME_DOCX, MIME_PDF, MIME_PPT};
  use crate::error::LlmError;
  use crate::extract::{fixtures, DocumentExtractor, TextExtractor};
  use crate::llm::testing::ScriptedLlm;
  use crate::llm::LlmClient;
  use crate::pipeline::testing::StubExtractor;
  use crate::routes::build_router;
  use axum::body::Body;
  use axum::http::{header, Request};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  const BOUNDARY: &str = "X-STUDY-QUIZ-BOUNDARY";

  fn router(llm: Option<Arc<dyn LlmClient>>, extractor: Arc<dyn TextExtractor>) -> axum::Router {
    build_router(Arc::new(AppState::with_parts(Settings::from_lookup(|_| None), llm, extractor)))
  }

  fn scripted(script: Vec<Result<String, LlmError>>) -> Option<Arc<dyn LlmClient>> {
    Some(Arc::new(ScriptedLlm::new(script)))
  }

  fn multipart_body(field: &str, file_name: &str, mime: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n");
    if let Some(mime) = mime {
      body.push_str(&format!("Content-Type: {mime}\r\n"));
    }
    body.push_str("\r\n");
    let mut out = body.into_bytes();
    out.extend_from_slice(bytes);
    out.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    out
  }

  fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/upload")
      .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
      .body(Body::from(body))
      .unwrap()
  }

  fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn upload_docx_returns_text() {
    let app = router(None, Arc::new(DocumentExtractor));
    let docx = fixtures::docx(&["Photosynthesis converts light.", "Chlorophyll is green."]);
    let (status, body) = send(app, upload_request(multipart_body("file", "bio.docx", Some(MIME_DOCX), &docx))).await;
    assert_eq!(status, StatusCode::OK);
    let content = body["content"].as_str().unwrap();
    assert!(content.contains("Photosynthesis converts light."));
    assert!(content.contains("Chlorophyll is green."));
  }

  #[tokio::test]
  async fn upload_falls_back_to_extension_for_generic_mime() {
    let stub = Arc::new(StubExtractor::text("slides"));
    let app = router(None, stub.clone());
    let req = upload_request(multipart_body("file", "deck.pptx", Some("application/octet-stream"), b"PK"));
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"content": "slides"}));
    assert_eq!(stub.calls(), 1);
  }

  #[tokio::test]
  async fn upload_without_file_field_is_400() {
    let app = router(None, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, upload_request(multipart_body("other", "a.pdf", Some("application/pdf"), b"x"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": {"message": "No file provided"}}));
  }

  #[tokio::test]
  async fn upload_unsupported_type_is_400_and_skips_extraction() {
    let stub = Arc::new(StubExtractor::text("never"));
    let app = router(None, stub.clone());
    let (status, body) = send(app, upload_request(multipart_body("file", "photo.png", Some("image/png"), b"\x89PNG"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": {"message": "Unsupported file type"}}));
    assert_eq!(stub.calls(), 0);
  }

  #[tokio::test]
  async fn upload_legacy_ppt_is_unsupported() {
    let app = router(None, Arc::new(DocumentExtractor));
    let req = upload_request(multipart_body("file", "deck.ppt", Some(MIME_PPT), &[0xD0, 0xCF, 0x11, 0xE0]));
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": {"message": "Unsupported file type"}}));
  }

  #[tokio::test]
  async fn upload_pdf_returns_page_text() {
    let app = router(None, Arc::new(DocumentExtractor));
    let bytes = fixtures::pdf(&["Paris is the capital of France.", "Lyon is a city."]);
    let (status, body) = send(app, upload_request(multipart_body("file", "geo.pdf", Some(MIME_PDF), &bytes))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"content": "Paris is the capital of France.\nLyon is a city."}));
  }

  #[tokio::test]
  async fn upload_extraction_failure_is_500() {
    let app = router(None, Arc::new(StubExtractor::failing("corrupt xref table")));
    let (status, body) = send(app, upload_request(multipart_body("file", "a.pdf", Some("application/pdf"), b"%PDF"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": {"message": "Failed to process file"}}));
  }

  #[tokio::test]
  async fn gemini_passthrough_shapes() {
    let app = router(None, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/gemini", json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "API key not set"}));

    let app = router(scripted(vec![Ok("hello".into())]), Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/gemini", json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": "hello"}));

    let failing = scripted(vec![Err(LlmError::Api { status: 429, message: "quota".into() })]);
    let app = router(failing, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/gemini", json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Gemini API error"}));
  }

  #[tokio::test]
  async fn quiz_endpoint_parses_and_maps_format_errors() {
    let reply = r#"```json
[{"question":"What is the capital of France?","options":["Paris","Lyon","Nice","Marseille"],"correctOption":"Paris"}]
```"#;
    let app = router(scripted(vec![Ok(reply.into())]), Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/quiz", json!({"content": "France notes"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quiz"][0]["correctOption"], "Paris");

    let app = router(scripted(vec![Ok("I cannot help with that.".into())]), Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/quiz", json!({"content": "France notes"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "quiz_format_error");

    let app = router(None, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/quiz", json!({"content": "France notes"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["kind"], "inference_failure");
  }

  #[tokio::test]
  async fn review_endpoint_scores_and_validates() {
    let quiz = json!([
      {"question": "Q1?", "options": ["a", "b", "c", "d"], "correctOption": "a"},
      {"question": "Q2?", "options": ["a", "b", "c", "d"], "correctOption": "b"}
    ]);
    let llm = scripted(vec![Ok("Because a.".into()), Err(LlmError::Http("reset".into()))]);
    let app = router(llm, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/review", json!({"quiz": quiz, "answers": ["a", "c"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 1);
    assert_eq!(body["results"][0]["explanation"], "Because a.");
    assert_eq!(body["results"][1]["explanation"], EXPLANATION_UNAVAILABLE);
    assert_eq!(body["results"][1]["selected"], "c");

    let app = router(None, Arc::new(StubExtractor::text("")));
    let (status, body) = send(app, json_request("/api/review", json!({"quiz": quiz, "answers": ["a"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");
  }

  #[tokio::test]
  async fn health_reports_inference_availability() {
    let app = router(None, Arc::new(StubExtractor::text("")));
    let res = app.oneshot(Request::get("/api/health").body(Body::empty()).unwrap()).await.unwrap();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"ok": true, "inference": false}));
  }
}

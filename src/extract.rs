//! Document text extraction.
//!
//! PDFs go through `pdf-extract`. DOCX and PPTX are OOXML packages: a zip
//! archive of XML parts, where text lives in `w:t` (Word) or `a:t` (DrawingML)
//! runs grouped into paragraphs. Legacy binary PPT has no loader.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use crate::domain::DocumentKind;
use crate::error::ExtractError;

/// Seam used by the pipeline so tests can substitute canned text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
  async fn extract(&self, bytes: Vec<u8>, media_type: &str, file_name: &str) -> Result<String, ExtractError>;
}

/// Extracts on the blocking pool; PDF parsing is CPU-bound and may panic on hostile input.
#[derive(Clone, Debug, Default)]
pub struct DocumentExtractor;

#[async_trait]
impl TextExtractor for DocumentExtractor {
  #[instrument(level = "info", target = "upload", skip(self, bytes), fields(len = bytes.len(), %media_type))]
  async fn extract(&self, bytes: Vec<u8>, media_type: &str, file_name: &str) -> Result<String, ExtractError> {
    let kind = DocumentKind::detect(media_type, file_name)
      .ok_or_else(|| ExtractError::UnsupportedFileType(media_type.to_string()))?;
    let text = tokio::task::spawn_blocking(move || extract_text(kind, &bytes))
      .await
      .map_err(|e| ExtractError::ExtractionFailure(format!("extraction task failed: {e}")))??;
    debug!(target: "upload", ?kind, text_len = text.len(), "Extracted document text");
    Ok(text)
  }
}

/// Synchronous extraction for a resolved document kind.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError> {
  match kind {
    DocumentKind::Pdf => extract_pdf(bytes),
    DocumentKind::Docx => extract_docx(bytes),
    DocumentKind::Pptx => extract_pptx(bytes),
    DocumentKind::Ppt => Err(ExtractError::UnsupportedFileType(
      "legacy PowerPoint (.ppt) files cannot be read; save the deck as .pptx and upload again".into(),
    )),
  }
}

/// One trimmed chunk per non-empty page, joined with newlines.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
  let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
    .map_err(|_| ExtractError::ExtractionFailure("PDF parser aborted on this file".into()))?
    .map_err(|e| ExtractError::ExtractionFailure(e.to_string()))?;
  let pages: Vec<&str> = pages.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
  Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
  let mut archive = open_package(bytes)?;
  let xml = read_part(&mut archive, "word/document.xml")?;
  ooxml_text(&xml, b"w:t", b"w:p")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
  let mut archive = open_package(bytes)?;
  let mut slides: Vec<(u32, String)> = archive
    .file_names()
    .filter_map(|name| {
      let n = name.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml")?.parse::<u32>().ok()?;
      Some((n, name.to_string()))
    })
    .collect();
  slides.sort_by_key(|(n, _)| *n);
  if slides.is_empty() {
    return Err(ExtractError::ExtractionFailure("presentation contains no slides".into()));
  }

  let mut texts = Vec::with_capacity(slides.len());
  for (_, name) in &slides {
    let xml = read_part(&mut archive, name)?;
    let text = ooxml_text(&xml, b"a:t", b"a:p")?;
    if !text.trim().is_empty() {
      texts.push(text.trim_end().to_string());
    }
  }
  Ok(texts.join("\n"))
}

fn open_package(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractError> {
  zip::ZipArchive::new(Cursor::new(bytes))
    .map_err(|e| ExtractError::ExtractionFailure(format!("not a valid Office document: {e}")))
}

fn read_part(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, ExtractError> {
  let mut part = archive
    .by_name(name)
    .map_err(|e| ExtractError::ExtractionFailure(format!("missing {name}: {e}")))?;
  let mut xml = String::new();
  part
    .read_to_string(&mut xml)
    .map_err(|e| ExtractError::ExtractionFailure(format!("unreadable {name}: {e}")))?;
  Ok(xml)
}

/// Property blocks (`w:pPr`, `w:rPr`, `a:pPr`, ...) hold formatting only;
/// a `w:tab` inside one is a tab-stop definition, not a tab character.
fn is_properties(name: &[u8]) -> bool {
  name.ends_with(b"Pr")
}

/// Collect the text runs of an OOXML part. `run` is the text element
/// (`w:t` / `a:t`), `para` the paragraph element; each paragraph ends with a newline.
fn ooxml_text(xml: &str, run: &[u8], para: &[u8]) -> Result<String, ExtractError> {
  let mut reader = Reader::from_str(xml);
  let mut out = String::new();
  let mut in_run = false;
  let mut props_depth = 0usize;

  loop {
    let event = reader
      .read_event()
      .map_err(|e| ExtractError::ExtractionFailure(format!("malformed XML at {}: {e}", reader.buffer_position())))?;
    match event {
      Event::Eof => break,
      Event::Start(e) if is_properties(e.name().as_ref()) => props_depth += 1,
      Event::End(e) if is_properties(e.name().as_ref()) => props_depth = props_depth.saturating_sub(1),
      _ if props_depth > 0 => {}
      Event::Start(e) if e.name().as_ref() == run => in_run = true,
      Event::End(e) if e.name().as_ref() == run => in_run = false,
      Event::End(e) if e.name().as_ref() == para => out.push('\n'),
      Event::Empty(e) => match e.name().as_ref() {
        b"w:tab" => out.push('\t'),
        b"w:br" | b"a:br" => out.push('\n'),
        name if name == para => out.push('\n'),
        _ => {}
      },
      Event::Text(t) if in_run => {
        let text = t
          .unescape()
          .map_err(|e| ExtractError::ExtractionFailure(format!("bad text run: {e}")))?;
        out.push_str(&text);
      }
      Event::CData(t) if in_run => out.push_str(&String::from_utf8_lossy(&t.into_inner())),
      _ => {}
    }
  }

  if out.trim().is_empty() {
    warn!(target: "upload", "Document part contained no text runs");
  }
  Ok(out)
}

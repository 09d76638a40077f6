//! Text extraction: DOCX bytes → ordered paragraph strings.
//!
//! Two strategies, selected by [`DocxExtraction`]:
//!
//! * **Paragraphs** (default); open `word/document.xml` in the zip container
//!   and concatenate the `w:t` text of every run, one string per top-level
//!   body paragraph. Tables, headers and footnotes are not part of the body
//!   paragraph list and are skipped. Nothing external is involved.
//! * **Converter**: let pandoc read the DOCX and emit Markdown with
//!   `tex_math_dollars`. Slower, but equations already stored as native Word
//!   math come back as `$...$` instead of disappearing.
//!
//! Both strategies apply [`normalize_quotes`] before the marker transform.

use crate::config::DocxExtraction;
use crate::error::EqDocxError;
use crate::locator::ToolHandle;
use crate::pipeline::normalize::normalize_quotes;
use crate::pipeline::render::{self, RenderOptions};
use crate::runner::ProcessRunner;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Paragraph text of one document, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    paragraphs: Vec<String>,
}

impl DocumentText {
    pub fn new(paragraphs: Vec<String>) -> Self {
        Self { paragraphs }
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraphs separated by one blank line.
    pub fn joined(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// Run the configured extraction strategy on DOCX bytes.
pub fn extract_docx(
    bytes: &[u8],
    mode: DocxExtraction,
    runner: &dyn ProcessRunner,
    tool: &ToolHandle,
    options: &RenderOptions,
) -> Result<DocumentText, EqDocxError> {
    match mode {
        DocxExtraction::Paragraphs => read_paragraphs(bytes),
        DocxExtraction::Converter => {
            let markdown = render::docx_to_markdown(runner, tool, bytes, options)?;
            let text = normalize_quotes(markdown.trim());
            Ok(if text.is_empty() {
                DocumentText::default()
            } else {
                DocumentText::new(vec![text])
            })
        }
    }
}

/// Read run-level paragraph text out of a DOCX container.
///
/// Each paragraph is trimmed and normalised; paragraphs left empty are dropped.
pub fn read_paragraphs(bytes: &[u8]) -> Result<DocumentText, EqDocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| EqDocxError::CorruptDocx {
        detail: format!("not a zip container: {e}"),
    })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| EqDocxError::CorruptDocx {
            detail: "word/document.xml is missing".into(),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| EqDocxError::CorruptDocx {
            detail: format!("word/document.xml is unreadable: {e}"),
        })?;

    let raw = parse_document_xml(&xml)?;
    // Empty paragraphs stay: they still add a blank line to the joined text,
    // which a marker spanning several paragraphs carries into its equation.
    let paragraphs: Vec<String> = raw.iter().map(|p| normalize_quotes(p.trim())).collect();

    debug!(
        "Extracted {} paragraphs ({} empty)",
        paragraphs.len(),
        paragraphs.iter().filter(|p| p.is_empty()).count()
    );
    Ok(DocumentText::new(paragraphs))
}

/// Collect raw run text for every top-level body paragraph.
fn parse_document_xml(xml: &str) -> Result<Vec<String>, EqDocxError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;

    let mut table_depth = 0usize;
    let mut para_depth = 0usize;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" => {
                    para_depth += 1;
                    if para_depth == 1 && table_depth == 0 {
                        current = Some(String::new());
                    }
                }
                b"w:r" => run_depth += 1,
                b"w:t" if run_depth > 0 => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" => {
                    if para_depth == 1 {
                        if let Some(text) = current.take() {
                            paragraphs.push(text);
                        }
                    }
                    para_depth = para_depth.saturating_sub(1);
                }
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if run_depth > 0 => {
                if let Some(text) = current.as_mut() {
                    match e.name().as_ref() {
                        b"w:tab" => text.push('\t'),
                        b"w:br" | b"w:cr" => text.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref t)) if in_text => {
                if let Some(text) = current.as_mut() {
                    let unescaped = t.unescape().map_err(|e| EqDocxError::CorruptDocx {
                        detail: format!("bad text entity in document.xml: {e}"),
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EqDocxError::CorruptDocx {
                    detail: format!(
                        "malformed document.xml at byte {}: {e}",
                        reader.buffer_position()
                    ),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

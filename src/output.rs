//! Result types returned by a successful conversion.

use crate::locator::ToolHandle;
use crate::pipeline::input::InputKind;
use serde::Serialize;

/// MIME type of the produced Word document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A delivered Word document plus what it took to make it.
///
/// Serialises without the document bytes; `--json` prints this summary.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub kind: InputKind,
    /// Suggested download name for the document.
    pub file_name: String,
    pub mime: &'static str,
    /// Markdown handed to the renderer. `None` for PDF input.
    pub markdown: Option<String>,
    pub tool: ToolHandle,
    pub stats: ConversionStats,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Non-empty paragraphs extracted from DOCX input.
    pub paragraphs: usize,
    /// `([ ... ])` markers rewritten to display math.
    pub math_blocks: usize,
    pub duration_ms: u64,
    /// Time spent inside the converter's render call.
    pub render_duration_ms: u64,
}

/// Markdown produced by the stages before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedMarkdown {
    pub markdown: String,
    pub paragraphs: usize,
    pub math_blocks: usize,
}

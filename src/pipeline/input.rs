//! Input resolution: turn a user-supplied file into a [`ConversionJob`].
//!
//! The job carries the raw bytes rather than a path. DOCX text is read
//! straight from memory, and pandoc gets its own copy inside a scoped temp
//! directory during rendering, so the caller's file is never touched and
//! nothing outlives the job.
//!
//! The kind is decided from magic bytes first (`%PDF`, `PK\x03\x04`) and the
//! file extension second, so a mislabelled upload still converts and a
//! random binary is rejected before pandoc ever sees it.

use crate::error::EqDocxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// The two document kinds the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Docx,
    Pdf,
}

impl InputKind {
    /// Classify `bytes`, falling back to the extension of `name`.
    ///
    /// A zip container is only accepted as DOCX; other OOXML formats (xlsx,
    /// pptx) share the magic bytes, so the extension must not say otherwise.
    pub fn detect(bytes: &[u8], name: Option<&Path>) -> Option<InputKind> {
        let ext = name
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        if bytes.starts_with(PDF_MAGIC) {
            return Some(InputKind::Pdf);
        }
        if bytes.starts_with(ZIP_MAGIC) {
            return match ext.as_deref() {
                None | Some("docx") | Some("docm") => Some(InputKind::Docx),
                Some(_) => None,
            };
        }
        None
    }

    /// File name offered for the converted document.
    pub fn suggested_output_name(&self) -> &'static str {
        match self {
            InputKind::Docx => "converted_equations.docx",
            InputKind::Pdf => "converted_from_pdf.docx",
        }
    }

    /// Extension pandoc needs on the temp input to pick its reader.
    pub(crate) fn extension(&self) -> &'static str {
        match self {
            InputKind::Docx => "docx",
            InputKind::Pdf => "pdf",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputKind::Docx => "DOCX",
            InputKind::Pdf => "PDF",
        })
    }
}

/// One conversion request: input bytes, their kind and optional metadata.
///
/// Created per user action and dropped once the output has been returned.
#[derive(Clone)]
pub struct ConversionJob {
    pub input: Vec<u8>,
    pub kind: InputKind,
    /// Rendered as a `# title` heading above the body (DOCX input only).
    pub title: Option<String>,
    /// Rendered as a bold `**author**` line under the title (DOCX input only).
    pub author: Option<String>,
    /// Where the bytes came from, for log and error messages.
    pub source_name: Option<PathBuf>,
}

impl fmt::Debug for ConversionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionJob")
            .field("input", &format_args!("<{} bytes>", self.input.len()))
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("source_name", &self.source_name)
            .finish()
    }
}

impl ConversionJob {
    /// Wrap in-memory bytes of a known kind.
    pub fn new(input: Vec<u8>, kind: InputKind) -> Self {
        Self {
            input,
            kind,
            title: None,
            author: None,
            source_name: None,
        }
    }

    /// Wrap in-memory bytes, detecting the kind from magic bytes.
    ///
    /// Empty input is reported as [`EqDocxError::InputMissing`].
    pub fn from_bytes(input: Vec<u8>, name: Option<&Path>) -> Result<Self, EqDocxError> {
        if input.is_empty() {
            return Err(EqDocxError::InputMissing {
                what: "input document".into(),
            });
        }
        let kind = InputKind::detect(&input, name).ok_or_else(|| EqDocxError::UnsupportedInput {
            name: name
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".into()),
            magic: input.iter().take(4).copied().collect(),
        })?;
        let mut job = Self::new(input, kind);
        job.source_name = name.map(Path::to_path_buf);
        Ok(job)
    }

    /// Read a local file and classify it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EqDocxError> {
        let path = path.as_ref();
        let bytes = read_local(path)?;
        let job = Self::from_bytes(bytes, Some(path))?;
        debug!("Loaded {} input: {}", job.kind, path.display());
        Ok(job)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into()).filter(|t: &String| !t.trim().is_empty());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into()).filter(|a: &String| !a.trim().is_empty());
        self
    }

    /// Display name of the input for log lines.
    pub fn display_name(&self) -> String {
        self.source_name
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<{} bytes of {}>", self.input.len(), self.kind))
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>, EqDocxError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EqDocxError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(EqDocxError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(EqDocxError::Internal(format!(
            "Failed to read '{}': {e}",
            path.display()
        ))),
    }
}

//! Error types for the eqdocx library.
//!
//! Every failure is fatal for the job that hit it: the pipeline performs a
//! single attempt and never returns partially converted output. The variants
//! fall into four groups:
//!
//! * **Access**: the password gate refused the caller.
//! * **Input**: nothing usable was supplied (missing, unreadable, wrong kind).
//! * **Converter**: pandoc could not be found, or ran and exited non-zero.
//!   [`EqDocxError::ExternalTool`] keeps the captured stdout/stderr verbatim.
//! * **I/O & config**: temporary artefacts, output file, builder validation.

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the eqdocx library.
#[derive(Debug, Error)]
pub enum EqDocxError {
    // ── Access errors ─────────────────────────────────────────────────────
    /// The access gate is enabled but no password is configured.
    #[error("Access password is not configured: {detail}\nSet {var} before starting eqdocx.")]
    Configuration { var: String, detail: String },

    /// The supplied password does not match the configured one.
    #[error("Incorrect access password.")]
    Authentication,

    // ── Input errors ──────────────────────────────────────────────────────
    /// The action was triggered without a required input document.
    #[error("No {what} was supplied.\nPass a .docx or .pdf file to convert.")]
    InputMissing { what: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a DOCX (zip) nor a PDF document.
    #[error("Unsupported input '{name}': expected a .docx or .pdf document\nFirst bytes: {magic:?}")]
    UnsupportedInput { name: String, magic: Vec<u8> },

    /// The DOCX container could not be read.
    #[error("DOCX document is corrupt: {detail}\nTry re-saving it from Word or LibreOffice.")]
    CorruptDocx { detail: String },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter could neither be found nor installed.
    #[error(
        "Document converter `{tool}` is not available.\n\
Tried:\n{attempts}\n\n\
Install it manually:\n\
  • macOS: brew install pandoc\n\
  • Ubuntu/Debian: sudo apt-get install -y pandoc\n\
  • Windows: download from https://pandoc.org/installing.html\n\
Or point --pandoc (EQDOCX_PANDOC) at an existing binary."
    )]
    ToolUnavailable { tool: String, attempts: String },

    /// The external converter ran but exited unsuccessfully.
    #[error(
        "`{}` {} while {}{}",
        .tool,
        exit_label(.code),
        activity(.stage),
        diagnostics(.stdout, .stderr)
    )]
    ExternalTool {
        tool: String,
        stage: Stage,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a temporary interop artefact failed.
    #[error("Temporary file error ({context}): {source}")]
    TempFile {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EqDocxError {
    pub(crate) fn temp_file(context: impl Into<String>, source: std::io::Error) -> Self {
        EqDocxError::TempFile {
            context: context.into(),
            source,
        }
    }

    /// Exit code of the external converter, when this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EqDocxError::ExternalTool { code, .. } => *code,
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exited with code {c}"),
        None => "did not exit normally".to_string(),
    }
}

fn activity(stage: &Stage) -> &'static str {
    stage.activity()
}

fn diagnostics(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stderr.trim().is_empty() {
        out.push_str("\n--- stderr ---\n");
        out.push_str(stderr.trim_end());
    }
    if !stdout.trim().is_empty() {
        out.push_str("\n--- stdout ---\n");
        out.push_str(stdout.trim_end());
    }
    out
}

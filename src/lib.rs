//! # eqdocx
//!
//! Turn Word documents with bracketed math into Word documents with native,
//! editable equations.
//!
//! Authors type display equations as `([ E = mc^2 ])` inside ordinary
//! paragraphs. eqdocx extracts the paragraph text, rewrites every marker into
//! a `$$ ... $$` display-math block and hands the result to pandoc, which
//! writes a DOCX where each block is a real Word equation object. PDF input
//! is passed to pandoc directly (best effort).
//!
//! ## Pipeline Overview
//!
//! ```text
//! DOCX / PDF
//!  │
//!  ├─ 1. Input      read the file, classify by magic bytes
//!  ├─ 2. Extract    paragraph text from word/document.xml (or via pandoc)
//!  ├─ 3. Transform  quotes → ASCII, ([ … ]) → $$ … $$, title/author header
//!  ├─ 4. Render     pandoc --from markdown+tex_math_dollars --to docx
//!  └─ 5. Deliver    DOCX bytes + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eqdocx::{ConversionConfig, ConversionJob, Converter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default());
//!     let job = ConversionJob::from_path("notes.docx")?.with_title("Lecture 3");
//!     let output = converter.convert(&job)?;
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `eqdocx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! eqdocx = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod access;
pub mod config;
pub mod convert;
pub mod error;
pub mod locator;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod runner;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use access::AccessGate;
pub use config::{ConversionConfig, ConversionConfigBuilder, DocxExtraction};
pub use convert::{convert_async, convert_to_file, Converter};
pub use error::EqDocxError;
pub use locator::{ManagedInstaller, ToolHandle, ToolInstaller, ToolLocator, ToolSource};
pub use observer::{ConversionObserver, NoopObserver, Observer};
pub use output::{ConversionOutput, ConversionStats, PreparedMarkdown, DOCX_MIME};
pub use pipeline::input::{ConversionJob, InputKind};
pub use pipeline::markers::to_markdown_with_math;
pub use pipeline::normalize::normalize_quotes;
pub use pipeline::Stage;
pub use runner::{ProcessOutput, ProcessRunner, SystemRunner};

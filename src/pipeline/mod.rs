//! Pipeline stages for DOCX/PDF → equation-DOCX conversion.
//!
//! Each submodule implements exactly one transformation step. Only
//! [`render`] (and [`extract`] in converter mode) touches the external
//! converter; everything else is pure and independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! DOCX: input ──▶ extract ──▶ normalize ──▶ markers ──▶ render ──▶ bytes
//! PDF:  input ─────────────────────────────────────────▶ render ──▶ bytes
//! ```
//!
//! 1. [`input`]:     load the user's file and classify it as DOCX or PDF
//! 2. [`extract`]:   read paragraph text out of the DOCX container
//! 3. [`normalize`]: fold typographic quotes, dashes and NBSPs to ASCII
//! 4. [`markers`]:   rewrite `([ ... ])` into `$$` display math
//! 5. [`render`]:    run pandoc in a scoped temp dir and collect the output

pub mod extract;
pub mod input;
pub mod markers;
pub mod normalize;
pub mod render;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a conversion job currently is.
///
/// DOCX jobs walk `Received → Extracted → Transformed → Rendered → Delivered`.
/// PDF jobs skip straight from `Received` to `Rendered`. Any stage can end in
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Received,
    Extracted,
    Transformed,
    Rendered,
    Delivered,
    Failed,
}

impl Stage {
    /// Short description of the work that leads into this stage.
    pub fn activity(&self) -> &'static str {
        match self {
            Stage::Received => "receiving the document",
            Stage::Extracted => "extracting document text",
            Stage::Transformed => "transforming math markers",
            Stage::Rendered => "rendering the Word document",
            Stage::Delivered => "delivering the output",
            Stage::Failed => "handling a failure",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Extracted => "extracted",
            Stage::Transformed => "transformed",
            Stage::Rendered => "rendered",
            Stage::Delivered => "delivered",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

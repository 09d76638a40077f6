//! Configuration types for equation-aware DOCX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One config is shared by every job a
//! [`crate::Converter`] runs.

use crate::error::EqDocxError;
use crate::observer::Observer;
use crate::pipeline::render::{RenderOptions, MARKDOWN_WITH_MATH};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use eqdocx::{ConversionConfig, DocxExtraction};
///
/// let config = ConversionConfig::builder()
///     .converter_command("/opt/pandoc/bin/pandoc")
///     .auto_install(false)
///     .extraction(DocxExtraction::Converter)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Converter executable, either a bare name looked up on `PATH` or a path.
    /// Default: `"pandoc"`.
    pub converter_command: String,

    /// Download a managed pandoc release when `converter_command` does not
    /// answer `--version`. Default: true.
    pub auto_install: bool,

    /// Where managed installs live. `None` uses the platform cache directory.
    pub install_dir: Option<PathBuf>,

    /// How DOCX text is read. Default: [`DocxExtraction::Paragraphs`].
    pub extraction: DocxExtraction,

    /// pandoc reader format for the generated Markdown.
    /// Default: `markdown+tex_math_dollars`.
    pub math_format: String,

    /// Word file whose styles the output should inherit (`--reference-doc`).
    pub reference_doc: Option<PathBuf>,

    /// Extra flags appended to every render invocation.
    pub extra_args: Vec<String>,

    /// Stage event sink.
    pub observer: Option<Observer>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            converter_command: "pandoc".to_string(),
            auto_install: true,
            install_dir: None,
            extraction: DocxExtraction::default(),
            math_format: MARKDOWN_WITH_MATH.to_string(),
            reference_doc: None,
            extra_args: Vec::new(),
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("converter_command", &self.converter_command)
            .field("auto_install", &self.auto_install)
            .field("install_dir", &self.install_dir)
            .field("extraction", &self.extraction)
            .field("math_format", &self.math_format)
            .field("reference_doc", &self.reference_doc)
            .field("extra_args", &self.extra_args)
            .field(
                "observer",
                &self.observer.as_ref().map(|_| "<dyn ConversionObserver>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Flags the renderer passes to every converter call.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            math_format: self.math_format.clone(),
            reference_doc: self.reference_doc.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn converter_command(mut self, command: impl Into<String>) -> Self {
        self.config.converter_command = command.into();
        self
    }

    pub fn auto_install(mut self, v: bool) -> Self {
        self.config.auto_install = v;
        self
    }

    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.install_dir = Some(dir.into());
        self
    }

    pub fn extraction(mut self, mode: DocxExtraction) -> Self {
        self.config.extraction = mode;
        self
    }

    pub fn math_format(mut self, format: impl Into<String>) -> Self {
        self.config.math_format = format.into();
        self
    }

    pub fn reference_doc(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.reference_doc = Some(path.into());
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, EqDocxError> {
        let c = &self.config;
        if c.converter_command.trim().is_empty() {
            return Err(EqDocxError::InvalidConfig(
                "converter command must not be empty".into(),
            ));
        }
        if c.math_format.trim().is_empty() {
            return Err(EqDocxError::InvalidConfig(
                "math format must not be empty".into(),
            ));
        }
        if let Some(ref doc) = c.reference_doc {
            if !doc.is_file() {
                return Err(EqDocxError::InvalidConfig(format!(
                    "reference document '{}' does not exist",
                    doc.display()
                )));
            }
        }
        Ok(self.config)
    }
}

/// Strategy for turning DOCX bytes into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocxExtraction {
    /// Read paragraph text straight from `word/document.xml`. (default)
    #[default]
    Paragraphs,
    /// Ask the converter for Markdown, keeping native Word equations.
    Converter,
}

impl std::str::FromStr for DocxExtraction {
    type Err = EqDocxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paragraphs" => Ok(DocxExtraction::Paragraphs),
            "converter" | "pandoc" => Ok(DocxExtraction::Converter),
            other => Err(EqDocxError::InvalidConfig(format!(
                "unknown extraction mode '{other}' (expected paragraphs or converter)"
            ))),
        }
    }
}

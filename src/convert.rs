//! Conversion entry points.
//!
//! [`Converter`] owns everything a job needs: the config, the process runner
//! and the [`ToolLocator`] that caches the resolved converter. One converter
//! can run any number of jobs; the tool is probed (or installed) at most once
//! on success.
//!
//! The core is synchronous because the work is a blocking child process.
//! [`convert_async`] and [`convert_to_file`] move it onto tokio's blocking
//! pool for async callers.

use crate::config::{ConversionConfig, DocxExtraction};
use crate::error::EqDocxError;
use crate::locator::{ManagedInstaller, ToolHandle, ToolInstaller, ToolLocator};
use crate::observer::ConversionObserver;
use crate::output::{ConversionOutput, ConversionStats, PreparedMarkdown, DOCX_MIME};
use crate::pipeline::extract::{self, DocumentText};
use crate::pipeline::input::{ConversionJob, InputKind};
use crate::pipeline::render::{self, RenderOptions};
use crate::pipeline::{markers, Stage};
use crate::runner::{ProcessRunner, SystemRunner};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs conversion jobs against one resolved converter.
pub struct Converter {
    config: ConversionConfig,
    render_options: RenderOptions,
    runner: Arc<dyn ProcessRunner>,
    locator: ToolLocator,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("locator", &self.locator)
            .finish()
    }
}

impl Converter {
    /// Converter that spawns real processes and, when
    /// [`ConversionConfig::auto_install`] is set, downloads pandoc on demand.
    pub fn new(config: ConversionConfig) -> Self {
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
        let installer = config.auto_install.then(|| {
            let mut managed = ManagedInstaller::new();
            if let Some(ref dir) = config.install_dir {
                managed = managed.with_cache_dir(dir);
            }
            Arc::new(managed) as Arc<dyn ToolInstaller>
        });
        let locator = ToolLocator::new(config.converter_command.clone(), runner.clone(), installer);
        Self::with_parts(config, runner, locator)
    }

    /// Assemble a converter from explicit parts (custom runner or installer).
    pub fn with_parts(
        config: ConversionConfig,
        runner: Arc<dyn ProcessRunner>,
        locator: ToolLocator,
    ) -> Self {
        let render_options = config.render_options();
        Self {
            config,
            render_options,
            runner,
            locator,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    /// Resolve the converter binary (cached after the first success).
    pub fn tool(&self) -> Result<&ToolHandle, EqDocxError> {
        self.locator.resolve()
    }

    /// Run a DOCX job up to the `Transformed` stage and return the Markdown
    /// that would be rendered.
    ///
    /// PDF input has no Markdown stage and is rejected.
    pub fn prepare_markdown(&self, job: &ConversionJob) -> Result<PreparedMarkdown, EqDocxError> {
        let mut tracker = StageTracker::new(self.config.observer.as_deref());
        tracker.advance(Stage::Received);
        let result = self.prepare(job, &mut tracker);
        if let Err(ref e) = result {
            tracker.fail(e);
        }
        result
    }

    /// Convert one job into a Word document.
    ///
    /// Either the full document comes back or an error does; nothing
    /// partially rendered is ever returned.
    pub fn convert(&self, job: &ConversionJob) -> Result<ConversionOutput, EqDocxError> {
        let mut tracker = StageTracker::new(self.config.observer.as_deref());
        let result = self.run(job, &mut tracker);
        match result {
            Ok(ref output) => {
                tracker.advance(Stage::Delivered);
                tracker.delivered(output.bytes.len());
            }
            Err(ref e) => tracker.fail(e),
        }
        result
    }

    fn run(
        &self,
        job: &ConversionJob,
        tracker: &mut StageTracker<'_>,
    ) -> Result<ConversionOutput, EqDocxError> {
        let start = Instant::now();
        info!("Starting conversion: {} ({})", job.display_name(), job.kind);
        tracker.advance(Stage::Received);

        let tool = self.locator.resolve()?.clone();

        let (bytes, prepared, render_duration_ms) = match job.kind {
            InputKind::Docx => {
                let prepared = self.prepare(job, tracker)?;
                let render_start = Instant::now();
                let bytes = render::markdown_to_docx(
                    self.runner.as_ref(),
                    &tool,
                    &prepared.markdown,
                    &self.render_options,
                )?;
                (bytes, Some(prepared), elapsed_ms(render_start))
            }
            InputKind::Pdf => {
                if job.title.is_some() || job.author.is_some() {
                    warn!("Title and author are ignored for PDF input");
                }
                let render_start = Instant::now();
                let bytes =
                    render::pdf_to_docx(self.runner.as_ref(), &tool, &job.input, &self.render_options)?;
                (bytes, None, elapsed_ms(render_start))
            }
        };
        tracker.advance(Stage::Rendered);

        let stats = ConversionStats {
            input_bytes: job.input.len(),
            output_bytes: bytes.len(),
            paragraphs: prepared.as_ref().map_or(0, |p| p.paragraphs),
            math_blocks: prepared.as_ref().map_or(0, |p| p.math_blocks),
            duration_ms: elapsed_ms(start),
            render_duration_ms,
        };

        info!(
            "Conversion complete: {} bytes in {}ms ({} math blocks)",
            stats.output_bytes, stats.duration_ms, stats.math_blocks
        );

        Ok(ConversionOutput {
            bytes,
            kind: job.kind,
            file_name: job.kind.suggested_output_name().to_string(),
            mime: DOCX_MIME,
            markdown: prepared.map(|p| p.markdown),
            tool,
            stats,
        })
    }

    /// `Received → Extracted → Transformed` for DOCX input.
    fn prepare(
        &self,
        job: &ConversionJob,
        tracker: &mut StageTracker<'_>,
    ) -> Result<PreparedMarkdown, EqDocxError> {
        if job.kind != InputKind::Docx {
            return Err(EqDocxError::InvalidConfig(format!(
                "{} input is converted directly and has no Markdown stage",
                job.kind
            )));
        }

        let text = self.extract(job)?;
        tracker.advance(Stage::Extracted);

        let joined = text.joined();
        let math_blocks = markers::find_math_blocks(&joined).len();
        let body = markers::to_markdown_with_math(&joined);
        let markdown = with_header(job.title.as_deref(), job.author.as_deref(), body);
        tracker.advance(Stage::Transformed);

        debug!(
            "Prepared {} bytes of Markdown from {} paragraphs",
            markdown.len(),
            text.paragraphs().len()
        );

        Ok(PreparedMarkdown {
            markdown,
            paragraphs: text.paragraphs().len(),
            math_blocks,
        })
    }

    fn extract(&self, job: &ConversionJob) -> Result<DocumentText, EqDocxError> {
        match self.config.extraction {
            DocxExtraction::Paragraphs => extract::read_paragraphs(&job.input),
            mode @ DocxExtraction::Converter => {
                let tool = self.locator.resolve()?;
                extract::extract_docx(
                    &job.input,
                    mode,
                    self.runner.as_ref(),
                    tool,
                    &self.render_options,
                )
            }
        }
    }
}

/// Run [`Converter::convert`] on tokio's blocking pool.
pub async fn convert_async(
    converter: Arc<Converter>,
    job: ConversionJob,
) -> Result<ConversionOutput, EqDocxError> {
    tokio::task::spawn_blocking(move || converter.convert(&job))
        .await
        .map_err(|e| EqDocxError::Internal(format!("conversion task failed: {e}")))?
}

/// Convert and write the document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    converter: Arc<Converter>,
    job: ConversionJob,
    output_path: impl AsRef<Path>,
) -> Result<ConversionOutput, EqDocxError> {
    let output = convert_async(converter, job).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EqDocxError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, &output.bytes)
        .await
        .map_err(|e| EqDocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(EqDocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        });
    }

    info!("Wrote {}", path.display());
    Ok(output)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// `# title` and `**author**` lines above the body, when provided.
fn with_header(title: Option<&str>, author: Option<&str>, body: String) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(t) = title {
        lines.push(format!("# {}\n", t.trim()));
    }
    if let Some(a) = author {
        lines.push(format!("**{}**\n", a.trim()));
    }
    if lines.is_empty() {
        return body;
    }
    format!("{}\n{}", lines.join("\n"), body)
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Tracks the current stage of one job and forwards transitions.
struct StageTracker<'a> {
    observer: Option<&'a dyn ConversionObserver>,
    current: Stage,
}

impl<'a> StageTracker<'a> {
    fn new(observer: Option<&'a dyn ConversionObserver>) -> Self {
        Self {
            observer,
            current: Stage::Received,
        }
    }

    fn advance(&mut self, stage: Stage) {
        self.current = stage;
        debug!("Stage: {}", stage);
        if let Some(obs) = self.observer {
            obs.on_stage(stage);
        }
    }

    fn fail(&mut self, error: &EqDocxError) {
        let at = self.current;
        self.current = Stage::Failed;
        warn!("Conversion failed after stage {}: {}", at, error);
        if let Some(obs) = self.observer {
            obs.on_failed(at, &error.to_string());
        }
    }

    fn delivered(&self, output_bytes: usize) {
        if let Some(obs) = self.observer {
            obs.on_delivered(output_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_with_title_and_author() {
        let md = with_header(Some("Physics"), Some("Ada"), "body".into());
        assert_eq!(md, "# Physics\n\n**Ada**\n\nbody");
    }

    #[test]
    fn header_with_title_only() {
        assert_eq!(with_header(Some(" T "), None, "b".into()), "# T\n\nb");
    }

    #[test]
    fn no_header_leaves_body_untouched() {
        assert_eq!(with_header(None, None, String::new()), "");
        assert_eq!(with_header(None, None, "x".into()), "x");
    }

    #[test]
    fn tracker_reports_last_stage_on_failure() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Last(Mutex<Option<Stage>>);
        impl ConversionObserver for Last {
            fn on_failed(&self, stage: Stage, _error: &str) {
                *self.0.lock().unwrap() = Some(stage);
            }
        }

        let obs = Last::default();
        let mut tracker = StageTracker::new(Some(&obs));
        tracker.advance(Stage::Received);
        tracker.advance(Stage::Extracted);
        tracker.fail(&EqDocxError::Authentication);

        assert_eq!(*obs.0.lock().unwrap(), Some(Stage::Extracted));
        assert_eq!(tracker.current, Stage::Failed);
    }
}

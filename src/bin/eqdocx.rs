//! CLI binary for eqdocx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use eqdocx::{
    convert_to_file, AccessGate, ConversionConfig, ConversionJob, ConversionObserver, Converter,
    DocxExtraction, EqDocxError, ManagedInstaller, Stage, SystemRunner, ToolHandle,
    ToolInstaller, ToolLocator,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI stage observer using indicatif ───────────────────────────────────────

/// Terminal spinner that names the step the job is about to run.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Converting");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ConversionObserver for CliObserver {
    fn on_stage(&self, stage: Stage) {
        let next = match stage {
            Stage::Received => "extracting text…",
            Stage::Extracted => "rewriting math markers…",
            Stage::Transformed => "rendering with pandoc…",
            Stage::Rendered => "collecting output…",
            Stage::Delivered | Stage::Failed => return,
        };
        self.bar.set_message(next);
    }

    fn on_failed(&self, stage: Stage, _error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} failed after stage {}", red("✘"), bold(&stage.to_string()));
    }

    fn on_delivered(&self, _output_bytes: usize) {
        self.bar.finish_and_clear();
    }
}

/// Byte progress bar for the managed pandoc download, hidden until the
/// first chunk arrives.
fn download_bar() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("pandoc");
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a DOCX with ([ ... ]) markers (writes converted_equations.docx)
  eqdocx notes.docx

  # Choose the output file and add a heading
  eqdocx notes.docx -o lecture3.docx --title "Lecture 3" --author "A. Lovelace"

  # Keep equations that are already native Word math
  eqdocx --extract converter mixed.docx

  # Preview the Markdown handed to pandoc
  eqdocx --markdown-only notes.docx

  # PDF → DOCX (best effort, writes converted_from_pdf.docx)
  eqdocx paper.pdf

  # Style the output after an existing document
  eqdocx notes.docx --reference-doc house-style.docx --pandoc-arg=--toc

  # Show which pandoc will be used
  eqdocx --check-tool

MARKERS:
  ([ E = mc^2 ])   becomes a display equation:   $$ E = mc^2 $$
  Markers may span lines; the first ]) closes the block. Existing $...$ and
  $$...$$ math is passed through unchanged.

ENVIRONMENT VARIABLES:
  EQDOCX_PANDOC           pandoc command or path (default: pandoc)
  EQDOCX_NO_INSTALL       Never download pandoc automatically
  EQDOCX_INSTALL_DIR      Where to install a managed pandoc
  PANDOC_AUTO_CACHE_DIR   Override the default managed pandoc cache directory
  APP_PASSWORD            Access password checked by --require-login
  EQDOCX_LOGIN            Password to present with --require-login

SETUP:
  If pandoc is not on PATH, eqdocx downloads an official release (~30 MB)
  on first run and caches it in ~/.cache/eqdocx/pandoc-<version>/.
  To use an existing copy: EQDOCX_PANDOC=/path/to/pandoc eqdocx ...
"#;

/// Convert ([ ... ]) math markers in Word documents into native equations.
#[derive(Parser, Debug)]
#[command(
    name = "eqdocx",
    version,
    about = "Convert ([ ... ]) math markers in Word documents into native equations",
    long_about = "Read a .docx whose display equations are written as ([ ... ]) markers, \
rewrite them as LaTeX display math and let pandoc produce a .docx with editable Word \
equations. PDF input is converted directly by pandoc.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input .docx or .pdf file.
    input: Option<PathBuf>,

    /// Output file. Default: converted_equations.docx / converted_from_pdf.docx.
    #[arg(short, long, env = "EQDOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// Title rendered as a heading above the document body (DOCX input).
    #[arg(long, env = "EQDOCX_TITLE")]
    title: Option<String>,

    /// Author rendered in bold under the title (DOCX input).
    #[arg(long, env = "EQDOCX_AUTHOR")]
    author: Option<String>,

    /// pandoc command name or path.
    #[arg(long, env = "EQDOCX_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// Never download pandoc; fail if the command above is unusable.
    #[arg(long, env = "EQDOCX_NO_INSTALL")]
    no_install: bool,

    /// Directory for the managed pandoc install.
    #[arg(long, env = "EQDOCX_INSTALL_DIR")]
    install_dir: Option<PathBuf>,

    /// How to read DOCX text: paragraphs (built in) or converter (pandoc).
    #[arg(long, env = "EQDOCX_EXTRACT", value_enum, default_value = "paragraphs")]
    extract: ExtractArg,

    /// Word document whose styles the output should use.
    #[arg(long, env = "EQDOCX_REFERENCE_DOC")]
    reference_doc: Option<PathBuf>,

    /// Extra argument passed to pandoc when rendering (repeatable).
    #[arg(long = "pandoc-arg", allow_hyphen_values = true)]
    pandoc_args: Vec<String>,

    /// Print the Markdown that would be rendered and stop.
    #[arg(long)]
    markdown_only: bool,

    /// Resolve pandoc, print its path and version, and exit.
    #[arg(long)]
    check_tool: bool,

    /// Print a JSON summary (file name, MIME type, tool, stats) on stdout.
    #[arg(long, env = "EQDOCX_JSON")]
    json: bool,

    /// Require the APP_PASSWORD access password.
    #[arg(long, env = "EQDOCX_REQUIRE_LOGIN")]
    require_login: bool,

    /// Access password to present with --require-login.
    #[arg(long, env = "EQDOCX_LOGIN", hide_env_values = true)]
    login: Option<String>,

    /// Disable progress spinner.
    #[arg(long, env = "EQDOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EQDOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EQDOCX_QUIET")]
    quiet: bool,
}

impl Cli {
    /// A Markdown preview from built-in extraction never calls pandoc.
    fn needs_tool(&self) -> bool {
        self.check_tool || !self.markdown_only || matches!(self.extract, ExtractArg::Converter)
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ExtractArg {
    Paragraphs,
    Converter,
}

impl From<ExtractArg> for DocxExtraction {
    fn from(v: ExtractArg) -> Self {
        match v {
            ExtractArg::Paragraphs => DocxExtraction::Paragraphs,
            ExtractArg::Converter => DocxExtraction::Converter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Access gate ──────────────────────────────────────────────────────
    if cli.require_login {
        AccessGate::from_env()
            .authenticate(cli.login.as_deref().unwrap_or(""))
            .context("Access denied")?;
    }

    // ── Build converter ──────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let dl_bar = download_bar();
    let config = build_config(&cli, observer.clone())?;
    let converter = Arc::new(build_converter(&cli, config, &dl_bar, show_progress));

    // ── Check-tool mode ──────────────────────────────────────────────────
    if cli.check_tool {
        let tool = resolve_tool(&converter, observer.as_deref(), &dl_bar);
        if let Some(ref obs) = observer {
            obs.finish();
        }
        let tool = tool?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&tool).context("Failed to serialise tool info")?
            );
        } else {
            println!("Path:     {}", tool.path.display());
            println!("Version:  {}", tool.version);
            println!("Source:   {:?}", tool.source);
        }
        return Ok(());
    }

    // ── Load input ───────────────────────────────────────────────────────
    let input = match cli.input {
        Some(ref p) => p,
        None => {
            if let Some(ref obs) = observer {
                obs.finish();
            }
            return Err(EqDocxError::InputMissing {
                what: "input document".into(),
            })
            .context("Nothing to convert");
        }
    };

    let mut job = ConversionJob::from_path(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    if let Some(ref t) = cli.title {
        job = job.with_title(t);
    }
    if let Some(ref a) = cli.author {
        job = job.with_author(a);
    }

    if cli.needs_tool() {
        if let Err(e) = resolve_tool(&converter, observer.as_deref(), &dl_bar) {
            if let Some(ref obs) = observer {
                obs.finish();
            }
            return Err(e);
        }
    }

    // ── Markdown preview mode ────────────────────────────────────────────
    if cli.markdown_only {
        let prepared = tokio::task::block_in_place(|| converter.prepare_markdown(&job));
        if let Some(ref obs) = observer {
            obs.finish();
        }
        let prepared = prepared.context("Failed to prepare Markdown")?;

        if let Some(ref path) = cli.output {
            tokio::fs::write(path, prepared.markdown.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        } else if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&prepared).context("Failed to serialise output")?
            );
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(prepared.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !prepared.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(job.kind.suggested_output_name()));

    let result = convert_to_file(converter, job, &output_path).await;
    if let Some(ref obs) = observer {
        obs.finish();
    }
    let output = result.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  {} math blocks  {}ms  →  {}",
            green("✔"),
            output.kind,
            output.stats.math_blocks,
            output.stats.duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!("{} ({})", output.tool.version, output.tool.path.display()))
        );
    }

    Ok(())
}

/// Resolve pandoc up front so a first-run download gets its own progress bar.
fn resolve_tool(
    converter: &Converter,
    observer: Option<&CliObserver>,
    dl_bar: &ProgressBar,
) -> Result<ToolHandle> {
    if let Some(obs) = observer {
        obs.bar.set_message("locating pandoc…");
    }
    // block_in_place keeps the borrow alive while a download blocks this
    // worker thread.
    let tool = tokio::task::block_in_place(|| converter.tool().cloned());
    if !dl_bar.is_hidden() {
        dl_bar.finish_with_message("ready ✓");
    }
    tool.context("pandoc is required")
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .converter_command(cli.pandoc.clone())
        .auto_install(!cli.no_install)
        .extraction(cli.extract.clone().into())
        .extra_args(cli.pandoc_args.iter().cloned());

    if let Some(ref dir) = cli.install_dir {
        builder = builder.install_dir(dir);
    }
    if let Some(ref doc) = cli.reference_doc {
        builder = builder.reference_doc(doc);
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs as Arc<dyn ConversionObserver>);
    }

    builder.build().context("Invalid configuration")
}

/// Wire a converter whose managed install reports into `dl_bar`.
fn build_converter(
    cli: &Cli,
    config: ConversionConfig,
    dl_bar: &ProgressBar,
    show_progress: bool,
) -> Converter {
    let runner = Arc::new(SystemRunner);

    let installer = config.auto_install.then(|| {
        let mut managed = ManagedInstaller::new();
        if let Some(ref dir) = cli.install_dir {
            managed = managed.with_cache_dir(dir);
        }
        if show_progress && !managed.is_cached() {
            let bar = dl_bar.clone();
            managed = managed.with_progress(Arc::new(move |downloaded, total| {
                if bar.is_hidden() {
                    bar.set_draw_target(ProgressDrawTarget::stderr());
                }
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }));
        }
        Arc::new(managed) as Arc<dyn ToolInstaller>
    });

    let locator = ToolLocator::new(config.converter_command.clone(), runner.clone(), installer);
    Converter::with_parts(config, runner, locator)
}

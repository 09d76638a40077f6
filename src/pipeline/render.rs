//! Rendering: hand documents to pandoc and collect what it produces.
//!
//! ## Scratch directories
//!
//! pandoc writes DOCX to a real path and picks its reader from the input
//! file's extension. Each call gets its own [`TempDir`], removed when the
//! call returns, whether pandoc succeeded or not.
//!
//! Markdown is fed on stdin; binary inputs are written into the temp dir.

use crate::error::EqDocxError;
use crate::locator::ToolHandle;
use crate::pipeline::input::InputKind;
use crate::pipeline::Stage;
use crate::runner::{ProcessOutput, ProcessRunner};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};

/// Reader format that turns `$...$` / `$$...$$` into TeX math.
pub const MARKDOWN_WITH_MATH: &str = "markdown+tex_math_dollars";

/// Converter flags shared by all render calls.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// pandoc `--from` format for Markdown input and `--to` format for
    /// converter-based extraction.
    pub math_format: String,
    /// Passed as `--reference-doc` to style the produced DOCX.
    pub reference_doc: Option<PathBuf>,
    /// Appended verbatim to every render invocation.
    pub extra_args: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            math_format: MARKDOWN_WITH_MATH.to_string(),
            reference_doc: None,
            extra_args: Vec::new(),
        }
    }
}

impl RenderOptions {
    fn push_output_flags(&self, args: &mut Vec<OsString>) {
        if let Some(ref doc) = self.reference_doc {
            let mut flag = OsString::from("--reference-doc=");
            flag.push(doc);
            args.push(flag);
        }
        args.extend(self.extra_args.iter().map(OsString::from));
    }
}

/// Markdown with math → DOCX with native equations.
pub fn markdown_to_docx(
    runner: &dyn ProcessRunner,
    tool: &ToolHandle,
    markdown: &str,
    options: &RenderOptions,
) -> Result<Vec<u8>, EqDocxError> {
    let dir = scratch_dir()?;
    let out_path = dir.path().join("output.docx");

    let mut args: Vec<OsString> = vec![
        "--from".into(),
        options.math_format.as_str().into(),
        "--to".into(),
        "docx".into(),
        "-o".into(),
        out_path.as_os_str().to_owned(),
    ];
    options.push_output_flags(&mut args);

    run_converter(runner, tool, &args, Some(markdown.as_bytes()), Stage::Rendered)?;
    read_output(&out_path)
}

/// PDF → DOCX in one converter call. Equation recovery is best effort.
pub fn pdf_to_docx(
    runner: &dyn ProcessRunner,
    tool: &ToolHandle,
    pdf: &[u8],
    options: &RenderOptions,
) -> Result<Vec<u8>, EqDocxError> {
    let dir = scratch_dir()?;
    let in_path = write_input(&dir, InputKind::Pdf, pdf)?;
    let out_path = dir.path().join("output.docx");

    let mut args: Vec<OsString> = vec![
        in_path.as_os_str().to_owned(),
        "-o".into(),
        out_path.as_os_str().to_owned(),
    ];
    options.push_output_flags(&mut args);

    run_converter(runner, tool, &args, None, Stage::Rendered)?;
    read_output(&out_path)
}

/// DOCX → Markdown with `$` math, captured from stdout.
pub fn docx_to_markdown(
    runner: &dyn ProcessRunner,
    tool: &ToolHandle,
    docx: &[u8],
    options: &RenderOptions,
) -> Result<String, EqDocxError> {
    let dir = scratch_dir()?;
    let in_path = write_input(&dir, InputKind::Docx, docx)?;

    let args: Vec<OsString> = vec![
        in_path.as_os_str().to_owned(),
        "--from".into(),
        "docx".into(),
        "--to".into(),
        options.math_format.as_str().into(),
        "--wrap=none".into(),
    ];

    let output = run_converter(runner, tool, &args, None, Stage::Extracted)?;
    Ok(output.stdout_lossy())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn scratch_dir() -> Result<TempDir, EqDocxError> {
    tempfile::Builder::new()
        .prefix("eqdocx-")
        .tempdir()
        .map_err(|e| EqDocxError::temp_file("creating scratch directory", e))
}

fn write_input(dir: &TempDir, kind: InputKind, bytes: &[u8]) -> Result<PathBuf, EqDocxError> {
    let path = dir.path().join(format!("input.{}", kind.extension()));
    std::fs::write(&path, bytes)
        .map_err(|e| EqDocxError::temp_file(format!("writing {}", path.display()), e))?;
    Ok(path)
}

fn read_output(path: &Path) -> Result<Vec<u8>, EqDocxError> {
    std::fs::read(path)
        .map_err(|e| EqDocxError::temp_file(format!("reading converter output {}", path.display()), e))
}

/// Run the converter once; any non-zero exit becomes [`EqDocxError::ExternalTool`].
fn run_converter(
    runner: &dyn ProcessRunner,
    tool: &ToolHandle,
    args: &[OsString],
    stdin: Option<&[u8]>,
    stage: Stage,
) -> Result<ProcessOutput, EqDocxError> {
    let start = Instant::now();
    let output = runner
        .run(&tool.path, args, stdin)
        .map_err(|e| EqDocxError::ExternalTool {
            tool: tool.path.display().to_string(),
            stage,
            code: None,
            stdout: String::new(),
            stderr: format!("failed to start: {e}"),
        })?;

    debug!(
        "{} exited with {:?} after {}ms",
        tool.path.display(),
        output.code,
        start.elapsed().as_millis()
    );

    if !output.success() {
        info!(
            "Converter failed while {} (exit {:?})",
            stage.activity(),
            output.code
        );
        return Err(EqDocxError::ExternalTool {
            tool: tool.path.display().to_string(),
            stage,
            code: output.code,
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::ToolSource;
    use std::sync::Mutex;

    /// Writes `payload` to whatever follows `-o`, or fails with `code`.
    struct ScriptedRunner {
        code: i32,
        payload: Vec<u8>,
        stdout: Vec<u8>,
        seen: Mutex<Vec<(Vec<OsString>, Option<Vec<u8>>)>>,
    }

    impl ScriptedRunner {
        fn ok(payload: &[u8]) -> Self {
            Self {
                code: 0,
                payload: payload.to_vec(),
                stdout: Vec::new(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(
            &self,
            _program: &Path,
            args: &[OsString],
            stdin: Option<&[u8]>,
        ) -> std::io::Result<ProcessOutput> {
            self.seen
                .lock()
                .unwrap()
                .push((args.to_vec(), stdin.map(<[u8]>::to_vec)));
            if self.code == 0 {
                if let Some(pos) = args.iter().position(|a| a == "-o") {
                    std::fs::write(&args[pos + 1], &self.payload)?;
                }
            }
            Ok(ProcessOutput {
                code: Some(self.code),
                stdout: self.stdout.clone(),
                stderr: if self.code == 0 { Vec::new() } else { b"boom".to_vec() },
            })
        }
    }

    fn tool() -> ToolHandle {
        ToolHandle {
            path: PathBuf::from("pandoc"),
            version: "pandoc 3.6.4".into(),
            source: ToolSource::Path,
        }
    }

    #[test]
    fn markdown_goes_through_stdin() {
        let runner = ScriptedRunner::ok(b"PK-docx");
        let bytes =
            markdown_to_docx(&runner, &tool(), "$$\nx\n$$\n", &RenderOptions::default()).unwrap();
        assert_eq!(bytes, b"PK-docx");

        let seen = runner.seen.lock().unwrap();
        let (args, stdin) = &seen[0];
        assert_eq!(stdin.as_deref(), Some(&b"$$\nx\n$$\n"[..]));
        assert_eq!(args[0], "--from");
        assert_eq!(args[1], MARKDOWN_WITH_MATH);
        assert_eq!(args[3], "docx");
    }

    #[test]
    fn reference_doc_and_extra_args_are_appended() {
        let runner = ScriptedRunner::ok(b"PK");
        let options = RenderOptions {
            reference_doc: Some(PathBuf::from("/styles/ref.docx")),
            extra_args: vec!["--toc".into()],
            ..RenderOptions::default()
        };
        markdown_to_docx(&runner, &tool(), "x", &options).unwrap();

        let seen = runner.seen.lock().unwrap();
        let args = &seen[0].0;
        assert!(args.contains(&OsString::from("--reference-doc=/styles/ref.docx")));
        assert_eq!(args.last().unwrap(), "--toc");
    }

    #[test]
    fn pdf_is_written_to_temp_input() {
        let runner = ScriptedRunner::ok(b"PK-from-pdf");
        let bytes = pdf_to_docx(&runner, &tool(), b"%PDF-1.4", &RenderOptions::default()).unwrap();
        assert_eq!(bytes, b"PK-from-pdf");

        let seen = runner.seen.lock().unwrap();
        let (args, stdin) = &seen[0];
        assert!(stdin.is_none());
        assert!(args[0].to_string_lossy().ends_with("input.pdf"));
        // The scratch directory is gone once the call returns.
        assert!(!Path::new(&args[0]).exists());
    }

    #[test]
    fn non_zero_exit_is_external_tool_error() {
        let runner = ScriptedRunner {
            code: 1,
            ..ScriptedRunner::ok(b"")
        };
        let err = markdown_to_docx(&runner, &tool(), "x", &RenderOptions::default()).unwrap_err();
        match err {
            EqDocxError::ExternalTool {
                code, stderr, stage, ..
            } => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "boom");
                assert_eq!(stage, Stage::Rendered);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn docx_to_markdown_reads_stdout() {
        let runner = ScriptedRunner {
            stdout: b"Energy: $E=mc^2$\n".to_vec(),
            ..ScriptedRunner::ok(b"")
        };
        let md = docx_to_markdown(&runner, &tool(), b"PK\x03\x04", &RenderOptions::default())
            .unwrap();
        assert_eq!(md, "Energy: $E=mc^2$\n");

        let seen = runner.seen.lock().unwrap();
        assert!(seen[0].0.contains(&OsString::from("--wrap=none")));
    }
}

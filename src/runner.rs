//! Narrow seam between the pipeline and child processes.
//!
//! Every external call the library makes goes through [`ProcessRunner`]:
//! `(program, args, optional stdin) -> (exit code, stdout, stderr)`. The
//! production implementation is [`SystemRunner`]; tests swap in a fake that
//! records calls and scripts responses, so the pipeline can be exercised on
//! machines without pandoc.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a program to completion and captures its output.
///
/// Implementations block until the child exits; there is no timeout.
/// `Err` is reserved for failing to start or talk to the process at all;
/// a non-zero exit is a successful `Ok` with `code != Some(0)`.
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        stdin: Option<&[u8]>,
    ) -> io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        stdin: Option<&[u8]>,
    ) -> io::Result<ProcessOutput> {
        debug!("exec {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from a helper thread so a child that fills its stdout
        // pipe before draining stdin cannot deadlock us.
        let writer = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => {
                let data = data.to_vec();
                Some(std::thread::spawn(move || pipe.write_all(&data)))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The child may exit before reading everything; its exit
                // status and stderr describe that better than EPIPE does.
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(io::Error::other("stdin writer thread panicked")),
            }
        }

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = SystemRunner
            .run(Path::new("sh"), &args(&["-c", "printf hi; exit 3"]), None)
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout_lossy(), "hi");
        assert!(!out.success());
    }

    #[test]
    fn pipes_stdin() {
        let out = SystemRunner
            .run(Path::new("cat"), &[], Some(b"$$\nx\n$$\n"))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, b"$$\nx\n$$\n");
    }

    #[test]
    fn captures_stderr() {
        let out = SystemRunner
            .run(Path::new("sh"), &args(&["-c", "echo oops >&2; exit 1"]), None)
            .unwrap();
        assert_eq!(out.stderr_lossy(), "oops\n");
        assert_eq!(out.code, Some(1));
    }

    #[test]
    fn missing_program_is_io_error() {
        let err = SystemRunner
            .run(Path::new("/definitely/not/a/program"), &[], None)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

//! External tool locator: find pandoc, installing it if needed, exactly once.
//!
//! Resolution order (first match wins):
//!
//! 1. **Configured command**: `pandoc` on `PATH`, or the explicit path from
//!    `--pandoc` / `EQDOCX_PANDOC`. Probed with `--version`.
//! 2. **Managed install**: [`ToolInstaller::install`] downloads a release
//!    binary into a local cache ([`ManagedInstaller`] wraps `pandoc-auto`);
//!    the installed binary is probed the same way.
//! 3. **Give up**: [`EqDocxError::ToolUnavailable`] listing every attempt and
//!    the manual install commands.
//!
//! The first successful [`ToolHandle`] is kept in a `OnceCell` owned by the
//! locator; later calls return it without probing again. Failures are not
//! cached, so a user who installs pandoc mid-session can simply retry.

use crate::error::EqDocxError;
use crate::runner::ProcessRunner;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress sink for the managed download: `(bytes_downloaded, total)`.
pub type DownloadProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// How a [`ToolHandle`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolSource {
    /// Found via the configured command name or path.
    Path,
    /// Installed (or already cached) by the managed installer.
    Managed,
}

/// A validated converter binary and the first line of its `--version` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolHandle {
    pub path: PathBuf,
    pub version: String,
    pub source: ToolSource,
}

/// Puts a converter binary on disk and returns its path.
pub trait ToolInstaller: Send + Sync {
    fn install(&self) -> Result<PathBuf, String>;
}

/// [`ToolInstaller`] that downloads an official pandoc release via `pandoc-auto`.
#[derive(Clone, Default)]
pub struct ManagedInstaller {
    cache_dir: Option<PathBuf>,
    on_progress: Option<DownloadProgress>,
}

impl ManagedInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install under `dir` instead of the platform cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, on_progress: DownloadProgress) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// `true` when the binary is already on disk and [`install`] will not
    /// touch the network.
    ///
    /// [`install`]: ToolInstaller::install
    pub fn is_cached(&self) -> bool {
        match self.cache_dir {
            Some(ref dir) => pandoc_auto::cached_pandoc_path_in(dir).is_some(),
            None => pandoc_auto::is_pandoc_cached(),
        }
    }
}

impl ToolInstaller for ManagedInstaller {
    fn install(&self) -> Result<PathBuf, String> {
        let progress = self
            .on_progress
            .as_deref()
            .map(|f| f as &dyn Fn(u64, Option<u64>));
        let result = match self.cache_dir {
            Some(ref dir) => pandoc_auto::ensure_pandoc_binary_in(dir, progress),
            None => pandoc_auto::ensure_pandoc_binary(progress),
        };
        result.map_err(|e| e.to_string())
    }
}

/// Resolves and caches the converter binary for one [`crate::Converter`].
pub struct ToolLocator {
    command: String,
    runner: Arc<dyn ProcessRunner>,
    installer: Option<Arc<dyn ToolInstaller>>,
    handle: OnceCell<ToolHandle>,
}

impl std::fmt::Debug for ToolLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLocator")
            .field("command", &self.command)
            .field("installer", &self.installer.as_ref().map(|_| "<dyn ToolInstaller>"))
            .field("handle", &self.handle.get())
            .finish()
    }
}

impl ToolLocator {
    /// `installer = None` disables step 2 of the resolution order.
    pub fn new(
        command: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        installer: Option<Arc<dyn ToolInstaller>>,
    ) -> Self {
        Self {
            command: command.into(),
            runner,
            installer,
            handle: OnceCell::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The cached handle, if resolution already succeeded.
    pub fn cached(&self) -> Option<&ToolHandle> {
        self.handle.get()
    }

    /// Resolve the converter, probing at most until the first success.
    pub fn resolve(&self) -> Result<&ToolHandle, EqDocxError> {
        self.handle.get_or_try_init(|| self.discover())
    }

    fn discover(&self) -> Result<ToolHandle, EqDocxError> {
        let mut attempts: Vec<String> = Vec::new();

        // ── Step 1: configured command ───────────────────────────────────
        let direct = PathBuf::from(&self.command);
        match self.probe(&direct) {
            Ok(version) => {
                info!("Using {} ({})", self.command, version);
                return Ok(ToolHandle {
                    path: direct,
                    version,
                    source: ToolSource::Path,
                });
            }
            Err(reason) => {
                debug!("Probe of `{}` failed: {}", self.command, reason);
                attempts.push(format!("`{}`: {}", self.command, reason));
            }
        }

        // ── Step 2: managed install ──────────────────────────────────────
        match self.installer {
            Some(ref installer) => {
                info!("`{}` not usable; attempting managed install", self.command);
                match installer.install() {
                    Ok(path) => match self.probe(&path) {
                        Ok(version) => {
                            info!("Using managed {} ({})", path.display(), version);
                            return Ok(ToolHandle {
                                path,
                                version,
                                source: ToolSource::Managed,
                            });
                        }
                        Err(reason) => {
                            attempts.push(format!("installed `{}`: {}", path.display(), reason))
                        }
                    },
                    Err(reason) => attempts.push(format!("managed install: {reason}")),
                }
            }
            None => attempts.push("managed install: disabled".to_string()),
        }

        warn!("Document converter unavailable after {} attempts", attempts.len());
        Err(EqDocxError::ToolUnavailable {
            tool: self.command.clone(),
            attempts: attempts
                .iter()
                .map(|a| format!("  • {a}"))
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }

    /// Run `<program> --version` and return the first non-empty output line.
    fn probe(&self, program: &Path) -> Result<String, String> {
        let output = self
            .runner
            .run(program, &[OsString::from("--version")], None)
            .map_err(|e| e.to_string())?;

        if !output.success() {
            return Err(match output.code {
                Some(c) => format!("`--version` exited with code {c}"),
                None => "`--version` did not exit normally".to_string(),
            });
        }

        output
            .stdout_lossy()
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "`--version` printed nothing".to_string())
    }
}

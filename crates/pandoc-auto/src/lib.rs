//! # pandoc-auto
//!
//! Auto-download and cache [pandoc](https://pandoc.org) release binaries at
//! runtime, so that tools which shell out to `pandoc` keep working on machines
//! where nobody installed it.
//!
//! ## How it works
//!
//! On a call to [`ensure_pandoc_binary`]:
//!
//! 1. Checks `~/.cache/eqdocx/pandoc-{VERSION}/` for the platform binary.
//! 2. If absent, downloads the matching archive from the
//!    [jgm/pandoc releases](https://github.com/jgm/pandoc/releases).
//! 3. Extracts `bin/pandoc` (or `pandoc.exe`) into the cache dir.
//!
//! Subsequent calls skip the network entirely; the binary is already cached.
//! This crate keeps no in-process state; callers that want at-most-once
//! resolution per process cache the returned path themselves.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pandoc_auto::ensure_pandoc_binary;
//!
//! let path = ensure_pandoc_binary(Some(&|downloaded, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading pandoc: {}/{} bytes", downloaded, t);
//!     }
//! })).expect("download failed");
//! println!("pandoc at {}", path.display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Arch    | Archive                                  |
//! |---------|---------|------------------------------------------|
//! | macOS   | arm64   | `pandoc-{VERSION}-arm64-macOS.zip`       |
//! | macOS   | x86_64  | `pandoc-{VERSION}-x86_64-macOS.zip`      |
//! | Linux   | x86_64  | `pandoc-{VERSION}-linux-amd64.tar.gz`    |
//! | Linux   | aarch64 | `pandoc-{VERSION}-linux-arm64.tar.gz`    |
//! | Windows | x86_64  | `pandoc-{VERSION}-windows-x86_64.zip`    |
//!
//! ## Environment variable overrides
//!
//! - `PANDOC_AUTO_CACHE_DIR`: override the default cache directory.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// The pandoc release tag used for downloads.
pub const PANDOC_VERSION: &str = "3.6.4";

/// GitHub release base URL.
const BASE_URL: &str = "https://github.com/jgm/pandoc/releases/download";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by pandoc-auto operations.
#[derive(Error, Debug)]
pub enum PandocAutoError {
    /// No prebuilt pandoc release exists for this OS/architecture.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Could not create or write into the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar/zip extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),
}

// ── Internal: platform metadata ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
}

struct PlatformInfo {
    /// Asset filename in the GitHub release, e.g. `pandoc-3.6.4-linux-amd64.tar.gz`.
    archive_name: String,
    archive_kind: ArchiveKind,
    /// Path suffix identifying the binary inside the archive. The archive
    /// root directory name differs between platforms, so only the tail is
    /// matched.
    binary_suffix: &'static str,
    /// Filename to write on disk.
    binary_name: &'static str,
}

fn detect_platform() -> Result<PlatformInfo, PandocAutoError> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let v = PANDOC_VERSION;

    let (archive_name, archive_kind, binary_suffix, binary_name) = match (os, arch) {
        ("macos", "aarch64") => (
            format!("pandoc-{v}-arm64-macOS.zip"),
            ArchiveKind::Zip,
            "/bin/pandoc",
            "pandoc",
        ),
        ("macos", "x86_64") => (
            format!("pandoc-{v}-x86_64-macOS.zip"),
            ArchiveKind::Zip,
            "/bin/pandoc",
            "pandoc",
        ),
        ("linux", "x86_64") => (
            format!("pandoc-{v}-linux-amd64.tar.gz"),
            ArchiveKind::TarGz,
            "/bin/pandoc",
            "pandoc",
        ),
        ("linux", "aarch64") => (
            format!("pandoc-{v}-linux-arm64.tar.gz"),
            ArchiveKind::TarGz,
            "/bin/pandoc",
            "pandoc",
        ),
        ("windows", "x86_64") => (
            format!("pandoc-{v}-windows-x86_64.zip"),
            ArchiveKind::Zip,
            "/pandoc.exe",
            "pandoc.exe",
        ),
        (os, arch) => {
            return Err(PandocAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };

    Ok(PlatformInfo {
        archive_name,
        archive_kind,
        binary_suffix,
        binary_name,
    })
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the per-version cache directory for the pandoc binary.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/eqdocx/pandoc-{VERSION}/`
/// - **Linux**: `~/.cache/eqdocx/pandoc-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\eqdocx\pandoc-{VERSION}\`
///
/// Override by setting `PANDOC_AUTO_CACHE_DIR`.
pub fn pandoc_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("PANDOC_AUTO_CACHE_DIR") {
        return versioned(Path::new(&override_dir));
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    versioned(&base.join("eqdocx"))
}

fn versioned(base: &Path) -> PathBuf {
    base.join(format!("pandoc-{PANDOC_VERSION}"))
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if pandoc is already cached on disk (no network access
/// needed on the next call to [`ensure_pandoc_binary`]).
pub fn is_pandoc_cached() -> bool {
    cached_pandoc_path().is_some()
}

/// Returns the on-disk path to the cached pandoc binary, or `None`.
pub fn cached_pandoc_path() -> Option<PathBuf> {
    cached_binary(&pandoc_cache_dir())
}

/// Like [`cached_pandoc_path`] for a cache rooted at `base`, as used by
/// [`ensure_pandoc_binary_in`].
pub fn cached_pandoc_path_in(base: &Path) -> Option<PathBuf> {
    cached_binary(&versioned(base))
}

fn cached_binary(cache_dir: &Path) -> Option<PathBuf> {
    let info = detect_platform().ok()?;
    let p = cache_dir.join(info.binary_name);
    p.exists().then_some(p)
}

/// Ensures a pandoc binary is present in the default cache directory.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during
/// the download.  Pass `None` to suppress progress callbacks.
pub fn ensure_pandoc_binary(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PandocAutoError> {
    install_into(&pandoc_cache_dir(), on_progress)
}

/// Like [`ensure_pandoc_binary`] but caches under `base` instead of the
/// platform cache directory. The versioned sub-directory is still appended.
pub fn ensure_pandoc_binary_in(
    base: &Path,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PandocAutoError> {
    install_into(&versioned(base), on_progress)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn install_into(
    cache_dir: &Path,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PandocAutoError> {
    let info = detect_platform()?;
    let binary_path = cache_dir.join(info.binary_name);

    if binary_path.exists() {
        return Ok(binary_path);
    }

    let url = format!("{}/{}/{}", BASE_URL, PANDOC_VERSION, info.archive_name);

    std::fs::create_dir_all(cache_dir).map_err(PandocAutoError::CacheDir)?;

    let archive_bytes = download_bytes(&url, on_progress)?;
    extract_binary(
        &archive_bytes,
        info.archive_kind,
        info.binary_suffix,
        &binary_path,
    )?;

    Ok(binary_path)
}

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, PandocAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pandoc-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PandocAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PandocAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PandocAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let capacity = total.unwrap_or(40 * 1024 * 1024) as usize;
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(PandocAutoError::Download(format!("Read error: {e}")));
            }
        }
    }

    Ok(buf)
}

/// Extracts the pandoc binary from an archive into `dest_path`.
///
/// The binary is written next to `dest_path` first and renamed into place, so
/// an interrupted extraction never leaves a truncated file that
/// [`is_pandoc_cached`] would report as installed.
fn extract_binary(
    archive_bytes: &[u8],
    kind: ArchiveKind,
    binary_suffix: &str,
    dest_path: &Path,
) -> Result<(), PandocAutoError> {
    let partial = dest_path.with_extension("part");

    match kind {
        ArchiveKind::TarGz => extract_from_tar_gz(archive_bytes, binary_suffix, &partial)?,
        ArchiveKind::Zip => extract_from_zip(archive_bytes, binary_suffix, &partial)?,
    }
    mark_executable(&partial)?;

    std::fs::rename(&partial, dest_path)
        .map_err(|e| PandocAutoError::Extract(format!("Rename failed: {e}")))
}

fn extract_from_tar_gz(
    archive_bytes: &[u8],
    binary_suffix: &str,
    dest_path: &Path,
) -> Result<(), PandocAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let gz = GzDecoder::new(archive_bytes);
    let mut archive = Archive::new(gz);

    for entry in archive
        .entries()
        .map_err(|e| PandocAutoError::Extract(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| PandocAutoError::Extract(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| PandocAutoError::Extract(e.to_string()))?;

        if entry_path.to_string_lossy().ends_with(binary_suffix) {
            entry
                .unpack(dest_path)
                .map_err(|e| PandocAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PandocAutoError::Extract(format!(
        "Binary '*{binary_suffix}' not found in archive"
    )))
}

fn extract_from_zip(
    archive_bytes: &[u8],
    binary_suffix: &str,
    dest_path: &Path,
) -> Result<(), PandocAutoError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| PandocAutoError::Extract(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| PandocAutoError::Extract(e.to_string()))?;
        if !file.name().ends_with(binary_suffix) {
            continue;
        }
        let mut out = std::fs::File::create(dest_path)
            .map_err(|e| PandocAutoError::Extract(format!("Create failed: {e}")))?;
        std::io::copy(&mut file, &mut out)
            .map_err(|e| PandocAutoError::Extract(format!("Write failed: {e}")))?;
        return Ok(());
    }

    Err(PandocAutoError::Extract(format!(
        "Binary '*{binary_suffix}' not found in archive"
    )))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), PandocAutoError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| PandocAutoError::Extract(format!("chmod failed: {e}")))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), PandocAutoError> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

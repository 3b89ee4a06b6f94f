//! # pdfium-locate
//!
//! Find the [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! for `pdfium-render`, downloading and caching it on first use.
//!
//! A [`LibraryLocator`] tries, in order:
//!
//! 1. an explicit path set with [`LibraryLocator::with_library_path`]
//!    (or captured from `PDFIUM_LIB_PATH` by [`LibraryLocator::from_env`]);
//! 2. the platform library inside the versioned cache directory;
//! 3. a download of the platform `.tgz` from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache directory.
//!
//! The locator holds no global state. Memoising the bound library for the
//! lifetime of a process is the caller's job.
//!
//! ```rust,no_run
//! use pdfium_locate::LibraryLocator;
//!
//! let locator = LibraryLocator::from_env();
//! let path = locator.resolve(None).expect("pdfium unavailable");
//! let pdfium = pdfium_locate::bind(&path).expect("bind failed");
//! # drop(pdfium);
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Environment variable naming an existing pdfium library.
pub const ENV_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Environment variable overriding the cache root.
pub const ENV_CACHE_DIR: &str = "PDFIUM_AUTO_CACHE_DIR";

/// Download progress: `(bytes_downloaded, total_bytes_if_known)`.
pub type ProgressFn<'a> = &'a dyn Fn(u64, Option<u64>);

/// Errors returned while locating or binding pdfium.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error at '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

/// Release asset and in-archive layout for one OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub archive_name: &'static str,
    pub member_path: &'static str,
    pub lib_name: &'static str,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Result<Self, LocateError> {
        Self::for_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn for_target(os: &str, arch: &str) -> Result<Self, LocateError> {
        let (archive_name, member_path, lib_name) = match (os, arch) {
            ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
            ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
            ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so"),
            ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so"),
            ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll"),
            ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll"),
            ("windows", "x86") => ("pdfium-win-x86.tgz", "bin/pdfium.dll", "pdfium.dll"),
            (os, arch) => {
                return Err(LocateError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };
        Ok(Self {
            archive_name,
            member_path,
            lib_name,
        })
    }

    /// Release download URL for this platform.
    pub fn download_url(&self) -> String {
        format!("{BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", self.archive_name)
    }
}

/// Resolves the on-disk location of the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    library_path: Option<PathBuf>,
    cache_root: Option<PathBuf>,
}

impl LibraryLocator {
    /// A locator with no overrides: cache in the user cache directory,
    /// download when missing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A locator seeded from `PDFIUM_LIB_PATH` and `PDFIUM_AUTO_CACHE_DIR`.
    ///
    /// The variables are read once, here.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            library_path: read(ENV_LIB_PATH),
            cache_root: read(ENV_CACHE_DIR),
        }
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_cache_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(dir.into());
        self
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library_path.as_deref()
    }

    /// Versioned cache directory, e.g. `~/.cache/pdf-preview/pdfium-7690/`.
    pub fn cache_dir(&self) -> PathBuf {
        let root = self.cache_root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(std::env::temp_dir)
                .join("pdf-preview")
        });
        root.join(format!("pdfium-{PDFIUM_VERSION}"))
    }

    /// Path of an already available library, without touching the network.
    pub fn cached_path(&self) -> Option<PathBuf> {
        if let Some(p) = self.library_path.as_ref().filter(|p| p.exists()) {
            return Some(p.clone());
        }
        let platform = Platform::current().ok()?;
        Some(self.cache_dir().join(platform.lib_name)).filter(|p| p.exists())
    }

    pub fn is_cached(&self) -> bool {
        self.cached_path().is_some()
    }

    /// Return the library path, downloading it into the cache if needed.
    ///
    /// Blocking: performs file-system and network I/O.
    pub fn resolve(&self, on_progress: Option<ProgressFn<'_>>) -> Result<PathBuf, LocateError> {
        if let Some(explicit) = &self.library_path {
            if explicit.exists() {
                debug!("Using pdfium from explicit path {}", explicit.display());
                return Ok(explicit.clone());
            }
            warn!(
                "pdfium library path '{}' does not exist; falling back to cache",
                explicit.display()
            );
        }

        let platform = Platform::current()?;
        let cache_dir = self.cache_dir();
        let lib_path = cache_dir.join(platform.lib_name);
        if lib_path.exists() {
            debug!("Using cached pdfium at {}", lib_path.display());
            return Ok(lib_path);
        }

        std::fs::create_dir_all(&cache_dir).map_err(|source| LocateError::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        let url = platform.download_url();
        info!("Downloading pdfium {} from {}", PDFIUM_VERSION, url);
        let archive = download(&url, on_progress)?;
        extract_member(&archive, platform.member_path, &lib_path)?;
        info!("pdfium cached at {}", lib_path.display());

        Ok(lib_path)
    }
}

/// Bind the pdfium library at `path`.
pub fn bind(path: &Path) -> Result<Pdfium, LocateError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| LocateError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn download(url: &str, on_progress: Option<ProgressFn<'_>>) -> Result<Vec<u8>, LocateError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-locate/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| LocateError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| LocateError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(LocateError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LocateError::Download(format!("Read error: {e}"))),
        }
    }

    Ok(buf)
}

/// Extract `member` from a gzipped tarball into `dest`.
///
/// The file is unpacked next to `dest` and renamed into place, so a
/// concurrent reader never sees a half-written library.
fn extract_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), LocateError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive));
    let entries = archive
        .entries()
        .map_err(|e| LocateError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| LocateError::Extract(e.to_string()))?;
        let is_member = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(|e| LocateError::Extract(e.to_string()))?;
        if !is_member {
            continue;
        }

        let partial = dest.with_extension("part");
        entry
            .unpack(&partial)
            .map_err(|e| LocateError::Extract(format!("unpack failed: {e}")))?;
        std::fs::rename(&partial, dest)
            .map_err(|e| LocateError::Extract(format!("rename failed: {e}")))?;
        return Ok(());
    }

    Err(LocateError::Extract(format!(
        "'{member}' not found in archive"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let gz = GzEncoder::new(Vec::new(), Compression::fast());
        let mut builder = tar::Builder::new(gz);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn current_platform_is_supported() {
        Platform::current().expect("current platform should be supported");
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = Platform::for_target("plan9", "mips").unwrap_err();
        assert!(err.to_string().contains("plan9/mips"));
    }

    #[test]
    fn download_url_names_release_and_asset() {
        let p = Platform::for_target("linux", "x86_64").unwrap();
        let url = p.download_url();
        assert!(url.contains(PDFIUM_VERSION));
        assert!(url.ends_with("pdfium-linux-x64.tgz"));
    }

    #[test]
    fn cache_dir_uses_override_and_version() {
        let locator = LibraryLocator::new().with_cache_root("/tmp/pdfium-locate-test");
        let dir = locator.cache_dir();
        assert!(dir.starts_with("/tmp/pdfium-locate-test"));
        assert!(dir.to_string_lossy().contains(PDFIUM_VERSION));
    }

    #[test]
    fn explicit_existing_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("libpdfium-custom.so");
        std::fs::write(&lib, b"not really a library").unwrap();

        let locator = LibraryLocator::new()
            .with_library_path(&lib)
            .with_cache_root(dir.path().join("cache"));
        assert_eq!(locator.resolve(None).unwrap(), lib);
        assert_eq!(locator.cached_path(), Some(lib));
    }

    #[test]
    fn cached_library_is_found_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let locator = LibraryLocator::new().with_cache_root(dir.path());
        assert!(!locator.is_cached());

        let platform = Platform::current().unwrap();
        std::fs::create_dir_all(locator.cache_dir()).unwrap();
        std::fs::write(locator.cache_dir().join(platform.lib_name), b"lib").unwrap();

        assert!(locator.is_cached());
        assert_eq!(
            locator.resolve(None).unwrap(),
            locator.cache_dir().join(platform.lib_name)
        );
    }

    #[test]
    fn extract_member_writes_only_the_library() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tarball(&[
            ("include/fpdfview.h", b"header"),
            ("lib/libpdfium.so", b"\x7fELF payload"),
        ]);
        let dest = dir.path().join("libpdfium.so");

        extract_member(&archive, "lib/libpdfium.so", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF payload");
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn extract_missing_member_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tarball(&[("README", b"nothing here")]);
        let err = extract_member(&archive, "lib/libpdfium.so", &dir.path().join("x.so"))
            .unwrap_err();
        assert!(matches!(err, LocateError::Extract(_)));
    }

    #[test]
    fn bind_rejects_non_library_file() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("libpdfium.so");
        std::fs::write(&bogus, b"garbage").unwrap();
        let err = bind(&bogus).unwrap_err();
        assert!(matches!(err, LocateError::Bind { .. }));
    }
}

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds ONNX model files, downloading them into the user cache on demand.
///
/// Lookup order: user cache directory, then the bundled directory, then
/// (for [`ModelResolver::resolve`] only) a download into the cache.
#[derive(Clone, Debug)]
pub struct ModelResolver {
    cache_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelResolver {
    pub fn new(bundled_dir: Option<PathBuf>) -> Result<Self, ModelResolveError> {
        Ok(Self::with_cache_dir(model_cache_dir()?, bundled_dir))
    }

    pub fn with_cache_dir(cache_dir: PathBuf, bundled_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            bundled_dir,
        }
    }

    /// Path of an already-present model, without touching the network.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let cached = self.cache_dir.join(name);
        if cached.exists() {
            return Some(cached);
        }
        self.bundled_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|path| path.exists())
    }

    pub fn resolve(
        &self,
        name: &str,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = self.locate(name) {
            return Ok(path);
        }
        fs::create_dir_all(&self.cache_dir).map_err(ModelResolveError::CacheDir)?;
        let cached_path = self.cache_dir.join(name);
        log::info!("Downloading {name} to {}", cached_path.display());
        download(url, &cached_path, progress)?;
        Ok(cached_path)
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Presence/models/`
/// - Linux: `$XDG_CACHE_HOME/Presence/models/` or `~/.cache/Presence/models/`
/// - Windows: `%LOCALAPPDATA%/Presence/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_inner(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(tmp: &TempDir) -> ModelResolver {
        ModelResolver::with_cache_dir(
            tmp.path().join("cache"),
            Some(tmp.path().join("bundled")),
        )
    }

    #[test]
    fn test_locate_prefers_cache_over_bundled() {
        let tmp = TempDir::new().unwrap();
        for dir in ["cache", "bundled"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("m.onnx"), dir).unwrap();
        }
        let path = resolver(&tmp).locate("m.onnx").unwrap();
        assert_eq!(path, tmp.path().join("cache").join("m.onnx"));
    }

    #[test]
    fn test_locate_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("bundled")).unwrap();
        fs::write(tmp.path().join("bundled").join("m.onnx"), b"x").unwrap();
        let path = resolver(&tmp).locate("m.onnx").unwrap();
        assert_eq!(path, tmp.path().join("bundled").join("m.onnx"));
    }

    #[test]
    fn test_locate_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        assert!(resolver(&tmp).locate("absent.onnx").is_none());
    }

    #[test]
    fn test_resolve_present_model_skips_download() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cache")).unwrap();
        fs::write(tmp.path().join("cache").join("m.onnx"), b"x").unwrap();
        let path = resolver(&tmp)
            .resolve("m.onnx", "http://invalid.nonexistent.example.com/m", None)
            .unwrap();
        assert!(path.ends_with("m.onnx"));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}

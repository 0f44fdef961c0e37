use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::gallery_store::GalleryStore;
use crate::shared::store_error::StoreError;

/// On-disk layout: two parallel arrays.
#[derive(Serialize, Deserialize, Default)]
struct GalleryFile {
    names: Vec<String>,
    encodings: Vec<Vec<f32>>,
}

/// Gallery persisted as a JSON file.
///
/// Appends rewrite the whole file through a sibling temp file and a rename,
/// so a crash mid-write leaves the previous gallery intact.
pub struct JsonGalleryStore {
    path: PathBuf,
}

impl JsonGalleryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// `Ok(None)` when the file does not exist yet.
    fn read_file(&self) -> Result<Option<GalleryFile>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: GalleryFile = serde_json::from_str(&contents)?;
        if file.names.len() != file.encodings.len() {
            return Err(StoreError::Invalid(format!(
                "{} names but {} encodings",
                file.names.len(),
                file.encodings.len()
            )));
        }
        Ok(Some(file))
    }

    fn write_file(&self, file: &GalleryFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec(file)?;
        fs::write(&temp_path, json).map_err(|e| self.io_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            self.io_error(e)
        })
    }
}

impl GalleryStore for JsonGalleryStore {
    fn load(&self) -> Result<Gallery, StoreError> {
        match self.read_file() {
            Ok(Some(file)) => {
                let gallery = Gallery::from_parts(file.names, file.encodings)
                    .map_err(|e| StoreError::Invalid(e.to_string()))?;
                log::info!(
                    "Loaded {} face encodings from {}",
                    gallery.len(),
                    self.path.display()
                );
                Ok(gallery)
            }
            Ok(None) => {
                log::info!("No gallery at {}, starting empty", self.path.display());
                Ok(Gallery::new())
            }
            Err(StoreError::Io { path, source }) => Err(StoreError::Io { path, source }),
            Err(e) => {
                log::warn!(
                    "Gallery at {} is unreadable ({e}), starting empty",
                    self.path.display()
                );
                Ok(Gallery::new())
            }
        }
    }

    /// Refuses to append to a corrupt file rather than overwrite it.
    fn append(&self, name: &str, embedding: &[f32]) -> Result<(), StoreError> {
        let mut file = self.read_file()?.unwrap_or_default();
        file.names.push(name.to_string());
        file.encodings.push(embedding.to_vec());
        self.write_file(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonGalleryStore::new(tmp.path().join("gallery.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(JsonGalleryStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_lengths_load_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.json");
        fs::write(&path, br#"{"names":["a","b"],"encodings":[[0.1]]}"#).unwrap();
        assert!(JsonGalleryStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = JsonGalleryStore::new(tmp.path().join("nested").join("gallery.json"));
        store.append("alice", &[0.1, 0.2]).unwrap();
        store.append("bob", &[0.3, 0.4]).unwrap();

        let gallery = store.load().unwrap();
        assert_eq!(gallery.names(), &["alice".to_string(), "bob".to_string()]);
        assert_eq!(gallery.embeddings()[1], vec![0.3, 0.4]);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_append_refuses_to_overwrite_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.json");
        fs::write(&path, b"garbage").unwrap();
        let store = JsonGalleryStore::new(&path);
        assert!(store.append("alice", &[0.1]).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"garbage");
    }

    #[test]
    fn test_loaded_gallery_identifies_enrolled_face() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.json");
        fs::write(&path, br#"{"names":["a"],"encodings":[[1.0,2.0]]}"#).unwrap();
        let gallery = JsonGalleryStore::new(&path).load().unwrap();
        assert_eq!(gallery.identify(&[1.0, 2.0], 0.5), "a");
    }
}

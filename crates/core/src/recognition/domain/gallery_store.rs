use crate::shared::store_error::StoreError;

use super::gallery::Gallery;

/// Persistent home of the enrolled gallery.
///
/// A missing or unreadable store loads as an empty gallery; only failures
/// that would lose data on the next write surface as errors.
pub trait GalleryStore: Send + Sync {
    fn load(&self) -> Result<Gallery, StoreError>;
    fn append(&self, name: &str, embedding: &[f32]) -> Result<(), StoreError>;
}

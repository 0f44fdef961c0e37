use crate::shared::store_error::StoreError;

/// Raw key/value persistence behind [`SettingsStore`](super::settings_store::SettingsStore).
pub trait SettingsSource: Send + Sync {
    /// `Ok(None)` when the key has never been written.
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

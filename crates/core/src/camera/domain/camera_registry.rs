use crate::shared::store_error::StoreError;

use super::camera_config::CameraConfig;

pub trait CameraRegistry: Send + Sync {
    /// Enabled cameras ordered by ascending priority value, then by creation.
    fn list_active(&self) -> Result<Vec<CameraConfig>, StoreError>;
}

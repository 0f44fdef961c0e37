use thiserror::Error;

use crate::shared::frame::Frame;

use super::camera_config::CameraConfig;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open camera {source_desc}: {reason}")]
    Open { source_desc: String, reason: String },
    #[error("failed to read frame: {0}")]
    Read(String),
    /// The capture backend itself cannot work on this host; retrying is
    /// pointless.
    #[error("capture backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// An open camera stream. Dropping it releases the device.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Opens camera streams for registry entries.
pub trait CameraBackend: Send + Sync {
    fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError>;
}

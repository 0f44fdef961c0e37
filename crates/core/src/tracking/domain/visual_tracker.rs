use thiserror::Error;

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

#[derive(Error, Debug, PartialEq)]
pub enum TrackerError {
    #[error("face box {0:?} is too small to track")]
    TooSmall(FaceBox),
    #[error("face region has no texture to correlate against")]
    Featureless,
    #[error("tracked face lost")]
    TargetLost,
}

/// Short-lived tracker that follows one face between detection cycles.
///
/// Started on the frame the face was detected in, then updated once per
/// captured frame.
pub trait VisualTracker: Send {
    fn update(&mut self, frame: &Frame) -> Result<FaceBox, TrackerError>;
}

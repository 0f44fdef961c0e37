use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Boxes are returned in the coordinate space of the frame passed in; the
/// caller is responsible for mapping them back when it detects on a
/// downscaled copy.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}

/// Builds detectors for a requested model. Construction may fail when a
/// model file or the inference runtime is unavailable.
pub trait DetectorProvider: Send + Sync {
    fn build(
        &self,
        model: super::detector_model::DetectorModel,
    ) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>>;
}

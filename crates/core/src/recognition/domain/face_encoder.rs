use thiserror::Error;

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("face box {0:?} is empty inside the frame")]
    EmptyCrop(FaceBox),
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Produces a fixed-length identity embedding for one face.
///
/// Embeddings from the same encoder are comparable by Euclidean distance;
/// the gallery never mixes encoders.
pub trait FaceEncoder: Send {
    fn encode(&mut self, frame: &Frame, face: &FaceBox) -> Result<Vec<f32>, EncoderError>;
}

/// Builds encoders. Each detection loop owns its own instance.
pub trait EncoderProvider: Send + Sync {
    fn build(&self) -> Result<Box<dyn FaceEncoder>, Box<dyn std::error::Error>>;
}

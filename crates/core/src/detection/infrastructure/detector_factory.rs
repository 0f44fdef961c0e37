use std::path::PathBuf;

use thiserror::Error;

use crate::detection::domain::detector_model::DetectorModel;
use crate::detection::domain::face_detector::{DetectorProvider, FaceDetector};

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_yolo_detector::{self, OnnxYoloDetector};

#[derive(Error, Debug)]
#[error("no face detector could be constructed: {0}")]
pub struct DetectorUnavailable(pub String);

/// A constructed detector together with the model it actually runs, which
/// differs from the requested one after a fallback.
pub struct ActiveDetector {
    pub model: DetectorModel,
    pub detector: Box<dyn FaceDetector>,
}

/// Build the requested detector, falling back to the accurate model when
/// the fast one cannot be initialized. Logs which backend is selected.
pub fn create_detector(
    provider: &dyn DetectorProvider,
    requested: DetectorModel,
) -> Result<ActiveDetector, DetectorUnavailable> {
    match provider.build(requested) {
        Ok(detector) => {
            log::info!("Using {requested} face detector");
            return Ok(ActiveDetector {
                model: requested,
                detector,
            });
        }
        Err(e) if requested == DetectorModel::Fast => {
            log::warn!("Fast detector unavailable ({e}), falling back to accurate detector");
        }
        Err(e) => return Err(DetectorUnavailable(e.to_string())),
    }

    provider
        .build(DetectorModel::Accurate)
        .map(|detector| ActiveDetector {
            model: DetectorModel::Accurate,
            detector,
        })
        .map_err(|e| DetectorUnavailable(e.to_string()))
}

/// Builds ONNX detectors from resolved model files.
#[derive(Clone, Debug)]
pub struct OnnxDetectorProvider {
    yolo_model: PathBuf,
    blazeface_model: Option<PathBuf>,
}

impl OnnxDetectorProvider {
    pub fn new(yolo_model: PathBuf, blazeface_model: Option<PathBuf>) -> Self {
        Self {
            yolo_model,
            blazeface_model,
        }
    }
}

impl DetectorProvider for OnnxDetectorProvider {
    fn build(
        &self,
        model: DetectorModel,
    ) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        match model {
            DetectorModel::Accurate => Ok(Box::new(OnnxYoloDetector::new(
                &self.yolo_model,
                onnx_yolo_detector::DEFAULT_CONFIDENCE,
            )?)),
            DetectorModel::Fast => {
                let path = self
                    .blazeface_model
                    .as_ref()
                    .ok_or("BlazeFace model not installed")?;
                Ok(Box::new(OnnxBlazefaceDetector::new(path)?))
            }
        }
    }
}

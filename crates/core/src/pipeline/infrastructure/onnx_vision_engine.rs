use std::path::PathBuf;
use std::sync::Arc;

use crate::detection::domain::face_detector::DetectorProvider;
use crate::detection::infrastructure::detector_factory::OnnxDetectorProvider;
use crate::detection::infrastructure::model_resolver::{
    ModelResolveError, ModelResolver, ProgressFn,
};
use crate::recognition::domain::face_encoder::EncoderProvider;
use crate::recognition::infrastructure::onnx_arcface_encoder::OnnxEncoderProvider;
use crate::shared::constants::{
    BLAZEFACE_MODEL_NAME, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME,
    YOLO_MODEL_URL,
};

/// ONNX-backed detector and encoder factories.
///
/// YOLO and ArcFace are downloaded on first use. BlazeFace is only picked
/// up when already present; without it the fast model falls back to YOLO.
pub struct OnnxVisionEngine {
    pub detectors: Arc<dyn DetectorProvider>,
    pub encoders: Arc<dyn EncoderProvider>,
}

impl OnnxVisionEngine {
    pub fn resolve(
        resolver: &ModelResolver,
        progress: Option<fn(u64, u64)>,
    ) -> Result<Self, ModelResolveError> {
        let report = || progress.map(|f| Box::new(f) as ProgressFn);
        let yolo = resolver.resolve(YOLO_MODEL_NAME, YOLO_MODEL_URL, report())?;
        let embedding = resolver.resolve(EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, report())?;
        let blazeface = resolver.locate(BLAZEFACE_MODEL_NAME);
        if blazeface.is_none() {
            log::info!("{BLAZEFACE_MODEL_NAME} not installed, fast detector unavailable");
        }

        Ok(Self {
            detectors: Arc::new(OnnxDetectorProvider::new(yolo, blazeface)),
            encoders: Arc::new(OnnxEncoderProvider::new(embedding)),
        })
    }

    /// Providers over already-installed models only. Missing models surface
    /// as build errors instead of downloads.
    pub fn installed(resolver: &ModelResolver) -> Self {
        let find = |name: &str| resolver.locate(name).unwrap_or_else(|| PathBuf::from(name));
        Self {
            detectors: Arc::new(OnnxDetectorProvider::new(
                find(YOLO_MODEL_NAME),
                resolver.locate(BLAZEFACE_MODEL_NAME),
            )),
            encoders: Arc::new(OnnxEncoderProvider::new(find(EMBEDDING_MODEL_NAME))),
        }
    }
}

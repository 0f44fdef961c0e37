pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Looked up in the model cache and bundled directory only; the fast
/// detector is optional and falls back to YOLO when absent.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Label for faces that match nobody in the gallery.
pub const UNKNOWN_NAME: &str = "Unknown";

pub const APP_DIR_NAME: &str = "Presence";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub mod detector_model;
pub mod face_detector;

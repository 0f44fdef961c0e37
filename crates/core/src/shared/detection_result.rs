use serde::Serialize;

use super::constants::UNKNOWN_NAME;
use super::face_box::FaceBox;

/// One recognized (or unrecognized) face from a detection cycle, with the
/// box in original-frame coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    pub face_box: FaceBox,
    pub name: String,
}

impl DetectionResult {
    pub fn new(face_box: FaceBox, name: impl Into<String>) -> Self {
        Self {
            face_box,
            name: name.into(),
        }
    }

    pub fn unknown(face_box: FaceBox) -> Self {
        Self::new(face_box, UNKNOWN_NAME)
    }

    pub fn is_known(&self) -> bool {
        self.name != UNKNOWN_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_known() {
        let face = FaceBox::new(0, 10, 10, 0);
        assert!(!DetectionResult::unknown(face).is_known());
        assert!(DetectionResult::new(face, "alice").is_known());
    }
}

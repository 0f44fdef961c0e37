use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Which detector the detection loop should run.
///
/// Stored in the `DETECTOR_MODEL` setting. Legacy names from older
/// installations map onto the two current variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorModel {
    /// Higher recall, CPU friendly (YOLO face).
    Accurate,
    /// Lightweight, fixed confidence floor (BlazeFace).
    Fast,
}

impl DetectorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accurate => "accurate",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for DetectorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accurate" | "yolo" | "dlib" | "hog" => Ok(Self::Accurate),
            "fast" | "blazeface" | "mediapipe" => Ok(Self::Fast),
            other => Err(format!("unknown detector model: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("accurate", DetectorModel::Accurate)]
    #[case("dlib", DetectorModel::Accurate)]
    #[case(" YOLO ", DetectorModel::Accurate)]
    #[case("fast", DetectorModel::Fast)]
    #[case("mediapipe", DetectorModel::Fast)]
    fn test_parse_known_names(#[case] raw: &str, #[case] expected: DetectorModel) {
        assert_eq!(raw.parse::<DetectorModel>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_name_fails() {
        assert!("retinaface".parse::<DetectorModel>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for model in [DetectorModel::Accurate, DetectorModel::Fast] {
            assert_eq!(model.to_string().parse::<DetectorModel>().unwrap(), model);
        }
    }
}

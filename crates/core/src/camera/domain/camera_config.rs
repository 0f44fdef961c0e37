use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Where frames come from: a local capture device or a stream URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VideoSource {
    Device(u32),
    Uri(String),
}

impl FromStr for VideoSource {
    type Err = String;

    /// All-digit strings are device indices, anything else is a URI.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty camera source".to_string());
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(VideoSource::Device)
                .map_err(|e| format!("invalid device index {s}: {e}"));
        }
        Ok(VideoSource::Uri(s.to_string()))
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(index) => write!(f, "{index}"),
            Self::Uri(uri) => f.write_str(uri),
        }
    }
}

/// One registered camera.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CameraConfig {
    pub name: String,
    pub source: VideoSource,
    pub enabled: bool,
    pub priority: i64,
}

impl CameraConfig {
    /// First local device; used when the registry has nothing usable.
    pub fn default_device() -> Self {
        Self {
            name: "Default Camera".to_string(),
            source: VideoSource::Device(0),
            enabled: true,
            priority: 0,
        }
    }
}

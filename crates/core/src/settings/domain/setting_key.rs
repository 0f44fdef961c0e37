use std::fmt;
use std::str::FromStr;

/// Keys of the live-tunable settings polled by the detection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    DetectorModel,
    Tolerance,
    DetectionScale,
    LateThreshold,
    DisappearThreshold,
    RecheckInterval,
    SystemMode,
    /// Detection cadence in new camera frames; 1 detects on every frame.
    /// Only the detection loop reads it, as a throttle on top of the
    /// latest-frame slot.
    FrameSkip,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::DetectorModel,
        SettingKey::Tolerance,
        SettingKey::DetectionScale,
        SettingKey::LateThreshold,
        SettingKey::DisappearThreshold,
        SettingKey::RecheckInterval,
        SettingKey::SystemMode,
        SettingKey::FrameSkip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DetectorModel => "DETECTOR_MODEL",
            Self::Tolerance => "TOLERANCE",
            Self::DetectionScale => "DETECTION_SCALE",
            Self::LateThreshold => "LATE_THRESHOLD",
            Self::DisappearThreshold => "DISAPPEAR_THRESHOLD",
            Self::RecheckInterval => "RECHECK_INTERVAL",
            Self::SystemMode => "SYSTEM_MODE",
            Self::FrameSkip => "FRAME_SKIP",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| format!("unknown setting: {s}"))
    }
}

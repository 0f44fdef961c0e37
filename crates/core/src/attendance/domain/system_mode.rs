use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Operator override for schedule-driven attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    /// Follow the timetable.
    #[default]
    Auto,
    /// Log attendance all day against a synthetic slot.
    ForceOn,
    /// Never log attendance.
    ForceOff,
}

impl SystemMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ForceOn => "force_on",
            Self::ForceOff => "force_off",
        }
    }

    /// Short label for the video overlay.
    pub fn overlay_label(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::ForceOn => "ON",
            Self::ForceOff => "OFF",
        }
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "force_on" | "on" => Ok(Self::ForceOn),
            "force_off" | "off" => Ok(Self::ForceOff),
            other => Err(format!("unknown system mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("auto", SystemMode::Auto)]
    #[case("FORCE_ON", SystemMode::ForceOn)]
    #[case("off", SystemMode::ForceOff)]
    fn test_parse(#[case] raw: &str, #[case] expected: SystemMode) {
        assert_eq!(raw.parse::<SystemMode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("sometimes".parse::<SystemMode>().is_err());
    }

    #[test]
    fn test_round_trips_through_display() {
        for mode in [SystemMode::Auto, SystemMode::ForceOn, SystemMode::ForceOff] {
            assert_eq!(mode.to_string().parse::<SystemMode>().unwrap(), mode);
        }
    }
}

use std::fmt;

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use super::schedule::{parse_clock_time, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceStatus {
    #[serde(rename = "On Time")]
    OnTime,
    Late,
    Present,
    Disappeared,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "On Time",
            Self::Late => "Late",
            Self::Present => "Present",
            Self::Disappeared => "Disappeared",
        }
    }

    /// Arrival status for a first sighting at `now`.
    ///
    /// The synthetic slot and unparseable start times yield `Present`;
    /// otherwise arriving up to and including `late_after` past the start
    /// is on time.
    pub fn on_arrival(schedule: &Schedule, now: DateTime<Local>, late_after: Duration) -> Self {
        if schedule.is_manual() {
            return Self::Present;
        }
        let Some(start) = parse_clock_time(&schedule.start_time) else {
            log::warn!(
                "Schedule {} has unparseable start time '{}'",
                schedule.id,
                schedule.start_time
            );
            return Self::Present;
        };
        let class_start = now.date_naive().and_time(start);
        if now.naive_local() <= class_start + late_after {
            Self::OnTime
        } else {
            Self::Late
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

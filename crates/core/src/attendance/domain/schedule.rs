use chrono::NaiveTime;
use serde::Serialize;

/// Id of the schedule synthesized in `force_on` mode.
pub const MANUAL_SCHEDULE_ID: i64 = -1;

/// One timetable slot. Times are `HH:MM` strings as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub id: i64,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub class_name: String,
    pub is_active: bool,
}

/// Identity of a class slot: a change means a new session.
pub type SlotFingerprint = (i64, String);

impl Schedule {
    /// Synthetic all-day slot used when attendance is forced on without a
    /// timetable entry.
    pub fn manual() -> Self {
        Self {
            id: MANUAL_SCHEDULE_ID,
            day_of_week: "Any".to_string(),
            start_time: "00:00".to_string(),
            end_time: "23:59".to_string(),
            class_name: "Manual".to_string(),
            is_active: true,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.id == MANUAL_SCHEDULE_ID
    }

    pub fn fingerprint(&self) -> SlotFingerprint {
        (self.id, self.start_time.clone())
    }

    /// Id to store with attendance rows; the synthetic slot has none.
    pub fn persisted_id(&self) -> Option<i64> {
        (!self.is_manual()).then_some(self.id)
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`).
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_manual_schedule_has_no_persisted_id() {
        let manual = Schedule::manual();
        assert!(manual.is_manual());
        assert_eq!(manual.persisted_id(), None);
        assert_eq!(manual.fingerprint(), (-1, "00:00".to_string()));
    }

    #[rstest]
    #[case("09:00", Some((9, 0, 0)))]
    #[case(" 13:45 ", Some((13, 45, 0)))]
    #[case("08:30:15", Some((8, 30, 15)))]
    #[case("9am", None)]
    #[case("25:00", None)]
    fn test_parse_clock_time(#[case] raw: &str, #[case] expected: Option<(u32, u32, u32)>) {
        let expected = expected.map(|(h, m, s)| NaiveTime::from_hms_opt(h, m, s).unwrap());
        assert_eq!(parse_clock_time(raw), expected);
    }
}

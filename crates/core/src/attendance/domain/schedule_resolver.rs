use std::sync::Arc;

use chrono::{DateTime, Datelike, Local};

use super::schedule::Schedule;
use super::system_mode::SystemMode;
use super::timetable_store::TimetableStore;

/// Answers "which class is running now" for a given system mode.
#[derive(Clone)]
pub struct ScheduleResolver {
    timetable: Arc<dyn TimetableStore>,
}

impl ScheduleResolver {
    pub fn new(timetable: Arc<dyn TimetableStore>) -> Self {
        Self { timetable }
    }

    pub fn resolve(&self, mode: SystemMode, now: DateTime<Local>) -> Option<Schedule> {
        match mode {
            SystemMode::ForceOff => None,
            SystemMode::ForceOn => Some(Schedule::manual()),
            SystemMode::Auto => match self.timetable.find_active_slot(now.weekday(), now.time()) {
                Ok(slot) => slot,
                Err(e) => {
                    log::warn!("Schedule lookup failed: {e}");
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::domain::schedule::parse_clock_time;
    use crate::shared::store_error::StoreError;
    use chrono::{NaiveTime, TimeZone, Weekday};

    /// In-memory timetable applying the same half-open, earliest-first rule
    /// as the SQLite store.
    struct MemoryTimetable {
        slots: Vec<(Weekday, Schedule)>,
        broken: bool,
    }

    impl TimetableStore for MemoryTimetable {
        fn find_active_slot(
            &self,
            day: Weekday,
            time: NaiveTime,
        ) -> Result<Option<Schedule>, StoreError> {
            if self.broken {
                return Err(StoreError::Invalid("timetable offline".into()));
            }
            let mut matching: Vec<_> = self
                .slots
                .iter()
                .filter(|(d, s)| *d == day && s.is_active)
                .filter(|(_, s)| {
                    let start = parse_clock_time(&s.start_time).unwrap();
                    let end = parse_clock_time(&s.end_time).unwrap();
                    start <= time && time < end
                })
                .map(|(_, s)| s.clone())
                .collect();
            matching.sort_by(|a, b| a.start_time.cmp(&b.start_time));
            Ok(matching.into_iter().next())
        }
    }

    fn slot(id: i64, start: &str, end: &str, active: bool) -> Schedule {
        Schedule {
            id,
            day_of_week: "Monday".into(),
            start_time: start.into(),
            end_time: end.into(),
            class_name: format!("Class {id}"),
            is_active: active,
        }
    }

    fn resolver(slots: Vec<Schedule>) -> ScheduleResolver {
        ScheduleResolver::new(Arc::new(MemoryTimetable {
            slots: slots.into_iter().map(|s| (Weekday::Mon, s)).collect(),
            broken: false,
        }))
    }

    /// 2024-03-04 is a Monday.
    fn monday(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn test_auto_finds_current_slot() {
        let r = resolver(vec![slot(1, "09:00", "10:00", true)]);
        assert_eq!(r.resolve(SystemMode::Auto, monday(9, 30)).map(|s| s.id), Some(1));
    }

    #[test]
    fn test_auto_end_time_is_exclusive() {
        let r = resolver(vec![slot(1, "09:00", "10:00", true)]);
        assert!(r.resolve(SystemMode::Auto, monday(10, 0)).is_none());
        assert!(r.resolve(SystemMode::Auto, monday(9, 0)).is_some());
    }

    #[test]
    fn test_auto_earliest_overlapping_slot_wins() {
        let r = resolver(vec![
            slot(2, "09:30", "11:00", true),
            slot(1, "09:00", "10:00", true),
        ]);
        assert_eq!(r.resolve(SystemMode::Auto, monday(9, 45)).map(|s| s.id), Some(1));
    }

    #[test]
    fn test_auto_ignores_inactive_slots_and_other_days() {
        let r = resolver(vec![slot(1, "09:00", "10:00", false)]);
        assert!(r.resolve(SystemMode::Auto, monday(9, 30)).is_none());

        let tuesday = Local.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let r = resolver(vec![slot(1, "09:00", "10:00", true)]);
        assert!(r.resolve(SystemMode::Auto, tuesday).is_none());
    }

    #[test]
    fn test_force_on_uses_manual_slot() {
        let r = resolver(vec![]);
        let schedule = r.resolve(SystemMode::ForceOn, monday(22, 0)).unwrap();
        assert!(schedule.is_manual());
        assert_eq!(schedule.class_name, "Manual");
    }

    #[test]
    fn test_force_off_ignores_timetable() {
        let r = resolver(vec![slot(1, "09:00", "10:00", true)]);
        assert!(r.resolve(SystemMode::ForceOff, monday(9, 30)).is_none());
    }

    #[test]
    fn test_timetable_error_resolves_to_none() {
        let r = ScheduleResolver::new(Arc::new(MemoryTimetable {
            slots: vec![],
            broken: true,
        }));
        assert!(r.resolve(SystemMode::Auto, monday(9, 30)).is_none());
    }
}

use chrono::{NaiveTime, Weekday};

use crate::shared::store_error::StoreError;

use super::schedule::Schedule;

pub trait TimetableStore: Send + Sync {
    /// The active timetable entry for `day` whose `[start_time, end_time)`
    /// contains `time`. When entries overlap, the earliest start wins.
    fn find_active_slot(&self, day: Weekday, time: NaiveTime) -> Result<Option<Schedule>, StoreError>;
}

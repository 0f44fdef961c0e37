use chrono::{NaiveTime, Weekday};
use rusqlite::{params, OptionalExtension, Row};

use crate::attendance::domain::schedule::Schedule;
use crate::attendance::domain::timetable_store::TimetableStore;
use crate::shared::store_error::StoreError;
use crate::storage::infrastructure::database::Database;

/// Timetable rows live in `class_schedules` with English day names and
/// zero-padded `HH:MM` times, so string comparison orders them correctly.
#[derive(Clone)]
pub struct SqliteTimetableStore {
    db: Database,
}

/// A timetable row to insert.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_name: String,
}

impl SqliteTimetableStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn add_schedule(&self, schedule: &NewSchedule) -> Result<i64, StoreError> {
        if schedule.end_time <= schedule.start_time {
            return Err(StoreError::Invalid(format!(
                "class ends ({}) before it starts ({})",
                schedule.end_time.format("%H:%M"),
                schedule.start_time.format("%H:%M")
            )));
        }
        let row = (
            day_name(schedule.day),
            schedule.start_time.format("%H:%M").to_string(),
            schedule.end_time.format("%H:%M").to_string(),
            schedule.class_name.clone(),
        );
        self.db.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO class_schedules (day_of_week, start_time, end_time, class_name, is_active)
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![row.0, row.1, row.2, row.3],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Every row, active or not, in week order.
    pub fn list_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        let mut schedules = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, day_of_week, start_time, end_time, class_name, is_active
                 FROM class_schedules ORDER BY start_time ASC, id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut schedules = Vec::new();
            while let Some(row) = rows.next()? {
                schedules.push(row_to_schedule(row)?);
            }
            Ok(schedules)
        })?;
        schedules.sort_by_key(|s| {
            s.day_of_week
                .parse::<Weekday>()
                .map_or(7, |d| d.num_days_from_monday())
        });
        Ok(schedules)
    }
}

fn row_to_schedule(row: &Row) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get("id")?,
        day_of_week: row.get("day_of_week")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        class_name: row.get("class_name")?,
        is_active: row.get("is_active")?,
    })
}

/// Full English weekday name as stored in `day_of_week`.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl TimetableStore for SqliteTimetableStore {
    fn find_active_slot(&self, day: Weekday, time: NaiveTime) -> Result<Option<Schedule>, StoreError> {
        let now = time.format("%H:%M").to_string();
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, day_of_week, start_time, end_time, class_name, is_active
                     FROM class_schedules
                     WHERE day_of_week = ?1 AND is_active = 1
                       AND start_time <= ?2 AND end_time > ?2
                     ORDER BY start_time ASC, id ASC
                     LIMIT 1",
                    params![day_name(day), now],
                    row_to_schedule,
                )
                .optional()?)
        })
    }
}

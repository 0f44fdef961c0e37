use rusqlite::{params, Connection, OptionalExtension};

use crate::attendance::domain::attendance_sink::{AttendanceRecord, AttendanceSink, StudentDirectory};
use crate::attendance::domain::attendance_status::AttendanceStatus;
use crate::shared::store_error::StoreError;
use crate::storage::infrastructure::database::Database;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes attendance rows and keeps the `students` table in step with the
/// gallery.
#[derive(Clone)]
pub struct SqliteAttendanceSink {
    db: Database,
}

impl SqliteAttendanceSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Row id of `name`, inserting the student when missing.
fn ensure_student(conn: &Connection, name: &str) -> Result<(i64, bool), StoreError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM students WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok((id, false));
    }
    conn.execute("INSERT INTO students (name) VALUES (?1)", params![name])?;
    Ok((conn.last_insert_rowid(), true))
}

impl AttendanceSink for SqliteAttendanceSink {
    fn record(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let timestamp = record.recorded_at.format(TIMESTAMP_FORMAT).to_string();
        // Arrival rows carry the sighting time; disappearance rows do not.
        let last_seen = (record.status != AttendanceStatus::Disappeared)
            .then(|| record.recorded_at.to_rfc3339());

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let (student_id, created) = ensure_student(&tx, &record.student)?;
            if created {
                log::info!("Added student '{}' on first sighting", record.student);
            }
            tx.execute(
                "INSERT INTO attendance_logs
                     (student_id, timestamp, status, source, notes, last_seen, schedule_id)
                 VALUES (?1, ?2, ?3, 'ai', ?4, ?5, ?6)",
                params![
                    student_id,
                    timestamp,
                    record.status.as_str(),
                    record.note.as_deref().unwrap_or(""),
                    last_seen,
                    record.schedule_id,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

impl StudentDirectory for SqliteAttendanceSink {
    fn ensure_students(&self, names: &[String]) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut added = 0;
            for name in names {
                if ensure_student(&tx, name)?.1 {
                    added += 1;
                }
            }
            tx.commit()?;
            Ok(added)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn record(student: &str, status: AttendanceStatus, schedule_id: Option<i64>) -> AttendanceRecord {
        AttendanceRecord {
            student: student.to_string(),
            status,
            schedule_id,
            note: None,
            recorded_at: Local.with_ymd_and_hms(2024, 3, 4, 9, 5, 0).unwrap(),
        }
    }

    fn schedule_row(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO class_schedules (day_of_week, start_time, end_time, class_name)
                 VALUES ('Monday', '09:00', '10:00', 'Physics')",
                [],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .unwrap()
    }

    type LogRow = (String, String, String, String, Option<String>, Option<i64>);

    fn logs(db: &Database) -> Vec<LogRow> {
        db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.name, a.timestamp, a.status, a.source, a.notes, a.schedule_id
                 FROM attendance_logs a JOIN students s ON s.id = a.student_id
                 ORDER BY a.id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .unwrap()
    }

    #[test]
    fn test_record_creates_missing_student() {
        let db = Database::open_in_memory().unwrap();
        let schedule_id = schedule_row(&db);
        let sink = SqliteAttendanceSink::new(db.clone());

        sink.record(&record("alice", AttendanceStatus::OnTime, Some(schedule_id)))
            .unwrap();

        let rows = logs(&db);
        assert_eq!(rows.len(), 1);
        let (name, timestamp, status, source, _, sid) = &rows[0];
        assert_eq!(name, "alice");
        assert_eq!(timestamp, "2024-03-04 09:05:00");
        assert_eq!(status, "On Time");
        assert_eq!(source, "ai");
        assert_eq!(*sid, Some(schedule_id));
    }

    #[test]
    fn test_disappearance_keeps_note() {
        let db = Database::open_in_memory().unwrap();
        let sink = SqliteAttendanceSink::new(db.clone());
        let mut disappeared = record("bob", AttendanceStatus::Disappeared, None);
        disappeared.note = Some("Last seen 16 min ago".into());

        sink.record(&disappeared).unwrap();

        let rows = logs(&db);
        assert_eq!(rows[0].2, "Disappeared");
        assert_eq!(rows[0].4.as_deref(), Some("Last seen 16 min ago"));
        assert_eq!(rows[0].5, None);
    }

    #[test]
    fn test_unknown_schedule_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let sink = SqliteAttendanceSink::new(db.clone());
        assert!(sink
            .record(&record("alice", AttendanceStatus::Late, Some(999)))
            .is_err());
        assert!(logs(&db).is_empty());
    }

    #[test]
    fn test_ensure_students_adds_only_new_names() {
        let db = Database::open_in_memory().unwrap();
        let sink = SqliteAttendanceSink::new(db);
        let names = vec!["alice".to_string(), "bob".to_string(), "alice".to_string()];

        assert_eq!(sink.ensure_students(&names).unwrap(), 2);
        assert_eq!(sink.ensure_students(&names).unwrap(), 0);
    }
}

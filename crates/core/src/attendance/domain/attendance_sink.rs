use chrono::{DateTime, Local};

use crate::shared::store_error::StoreError;

use super::attendance_status::AttendanceStatus;

/// One attendance event produced by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student: String,
    pub status: AttendanceStatus,
    pub schedule_id: Option<i64>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Local>,
}

pub trait AttendanceSink: Send + Sync {
    fn record(&self, record: &AttendanceRecord) -> Result<(), StoreError>;
}

/// Student roster kept in step with the gallery.
pub trait StudentDirectory: Send + Sync {
    /// Make sure every name has a student row. Returns how many were added.
    fn ensure_students(&self, names: &[String]) -> Result<usize, StoreError>;
}

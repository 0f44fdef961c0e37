pub mod sqlite_attendance_sink;
pub mod sqlite_timetable_store;

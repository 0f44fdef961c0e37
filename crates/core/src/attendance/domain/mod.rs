pub mod attendance_session;
pub mod attendance_sink;
pub mod attendance_status;
pub mod schedule;
pub mod schedule_resolver;
pub mod system_mode;
pub mod timetable_store;

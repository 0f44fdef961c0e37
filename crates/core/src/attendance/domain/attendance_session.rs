//! Attendance deduplication and disappearance state machine.
//!
//! A session covers one class slot. Within it each student is logged at most
//! once on arrival (`{name}:{schedule_id}`) and at most once as disappeared
//! (`{name}:disappeared`). Moving to a different slot, including into or out
//! of "no class", starts a fresh session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local};

use crate::shared::constants::UNKNOWN_NAME;

use super::attendance_sink::{AttendanceRecord, AttendanceSink};
use super::attendance_status::AttendanceStatus;
use super::schedule::{Schedule, SlotFingerprint};

/// Timing rules for one session, refreshed from settings every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionPolicy {
    /// Arrivals up to this long after class start are on time.
    pub late_threshold: Duration,
    /// Unseen for longer than this counts as disappeared.
    pub disappear_threshold: Duration,
    /// Minimum spacing between disappearance sweeps.
    pub recheck_interval: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            late_threshold: Duration::minutes(10),
            disappear_threshold: Duration::minutes(15),
            recheck_interval: Duration::seconds(300),
        }
    }
}

pub struct AttendanceSession {
    sink: Arc<dyn AttendanceSink>,
    policy: SessionPolicy,
    schedule: Option<Schedule>,
    fingerprint: Option<SlotFingerprint>,
    logged: HashSet<String>,
    last_seen: HashMap<String, DateTime<Local>>,
    last_sweep: Option<DateTime<Local>>,
}

impl AttendanceSession {
    pub fn new(sink: Arc<dyn AttendanceSink>, policy: SessionPolicy) -> Self {
        Self {
            sink,
            policy,
            schedule: None,
            fingerprint: None,
            logged: HashSet::new(),
            last_seen: HashMap::new(),
            last_sweep: None,
        }
    }

    pub fn set_policy(&mut self, policy: SessionPolicy) {
        self.policy = policy;
    }

    pub fn active_schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Number of dedup keys recorded in the current session.
    pub fn logged_count(&self) -> usize {
        self.logged.len()
    }

    pub fn last_seen(&self, name: &str) -> Option<DateTime<Local>> {
        self.last_seen.get(name).copied()
    }

    /// Feed the slot resolved for this cycle, then run the disappearance
    /// sweep if it is due.
    pub fn observe_schedule(&mut self, schedule: Option<Schedule>, now: DateTime<Local>) {
        let fingerprint = schedule.as_ref().map(Schedule::fingerprint);
        if fingerprint != self.fingerprint {
            if !self.logged.is_empty() || !self.last_seen.is_empty() {
                log::info!(
                    "Class slot changed ({} -> {}), starting a new attendance session",
                    describe(self.schedule.as_ref()),
                    describe(schedule.as_ref())
                );
            }
            self.reset();
            self.fingerprint = fingerprint;
        }
        self.schedule = schedule;
        self.sweep_disappearances(now);
    }

    /// A face was recognized as `name` at `now`.
    pub fn record_sighting(&mut self, name: &str, now: DateTime<Local>) {
        if name == UNKNOWN_NAME {
            return;
        }
        let Some(schedule) = self.schedule.as_ref() else {
            self.last_seen.insert(name.to_string(), now);
            return;
        };

        let key = format!("{name}:{}", schedule.id);
        if self.logged.contains(&key) {
            self.last_seen.insert(name.to_string(), now);
            return;
        }

        let status = AttendanceStatus::on_arrival(schedule, now, self.policy.late_threshold);
        let record = AttendanceRecord {
            student: name.to_string(),
            status,
            schedule_id: schedule.persisted_id(),
            note: None,
            recorded_at: now,
        };
        match self.sink.record(&record) {
            Ok(()) => {
                log::info!("[ATTENDANCE] {name} → {status} ({})", schedule.class_name);
                self.logged.insert(key);
                self.last_seen.insert(name.to_string(), now);
            }
            Err(e) => log::error!("Attendance log for {name} failed: {e}"),
        }
    }

    /// Forget everything recorded for the current slot.
    pub fn reset(&mut self) {
        self.logged.clear();
        self.last_seen.clear();
    }

    fn sweep_disappearances(&mut self, now: DateTime<Local>) {
        let Some(schedule) = self.schedule.as_ref() else {
            return;
        };
        if let Some(last) = self.last_sweep {
            if now - last < self.policy.recheck_interval {
                return;
            }
        }
        self.last_sweep = Some(now);

        let mut stale: Vec<(&String, Duration)> = self
            .last_seen
            .iter()
            .map(|(name, seen)| (name, now - *seen))
            .filter(|(_, elapsed)| *elapsed > self.policy.disappear_threshold)
            .collect();
        stale.sort();

        let mut newly_logged = Vec::new();
        for (name, elapsed) in stale {
            let key = format!("{name}:disappeared");
            if self.logged.contains(&key) {
                continue;
            }
            let minutes = elapsed.num_minutes();
            let record = AttendanceRecord {
                student: name.clone(),
                status: AttendanceStatus::Disappeared,
                schedule_id: schedule.persisted_id(),
                note: Some(format!("Last seen {minutes} min ago")),
                recorded_at: now,
            };
            match self.sink.record(&record) {
                Ok(()) => {
                    log::warn!("[DISAPPEARED] {name}: last seen {minutes} min ago");
                    newly_logged.push(key);
                }
                Err(e) => log::error!("Disappearance log for {name} failed: {e}"),
            }
        }
        self.logged.extend(newly_logged);
    }
}

fn describe(schedule: Option<&Schedule>) -> String {
    match schedule {
        Some(s) => format!("{} {}", s.class_name, s.start_time),
        None => "no class".to_string(),
    }
}

use chrono::Duration;
use serde::Serialize;

use crate::attendance::domain::attendance_session::SessionPolicy;
use crate::attendance::domain::system_mode::SystemMode;
use crate::detection::domain::detector_model::DetectorModel;
use crate::settings::domain::setting_key::SettingKey;
use crate::settings::domain::settings_store::SettingsStore;

pub const MIN_DETECTION_SCALE: f64 = 0.1;
pub const MAX_DETECTION_SCALE: f64 = 1.0;

/// Live configuration of the pipeline, snapshotted from settings once per
/// detection cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub detector_model: DetectorModel,
    /// Maximum embedding distance for a match (exclusive).
    pub tolerance: f64,
    /// Factor applied to frames before detection.
    pub detection_scale: f64,
    pub late_threshold_min: i64,
    pub disappear_threshold_min: i64,
    pub recheck_interval_secs: i64,
    pub system_mode: SystemMode,
    /// Run detection on every n-th new frame (default 3). Config refresh and
    /// schedule observation still run on every frame.
    pub frame_skip: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector_model: DetectorModel::Accurate,
            // ArcFace embeddings are unit length, so distances fall in [0, 2].
            tolerance: 1.0,
            detection_scale: 0.5,
            late_threshold_min: 10,
            disappear_threshold_min: 15,
            recheck_interval_secs: 300,
            system_mode: SystemMode::Auto,
            frame_skip: 3,
        }
    }
}

impl PipelineConfig {
    /// Read every setting, keeping the value from `previous` for anything
    /// missing, unparseable or out of range.
    pub fn load(store: &SettingsStore, previous: &PipelineConfig) -> Self {
        let tolerance = store.get(SettingKey::Tolerance, previous.tolerance);
        let detection_scale = store.get(SettingKey::DetectionScale, previous.detection_scale);
        let late_threshold_min = store.get(SettingKey::LateThreshold, previous.late_threshold_min);
        let disappear_threshold_min =
            store.get(SettingKey::DisappearThreshold, previous.disappear_threshold_min);
        let recheck_interval_secs =
            store.get(SettingKey::RecheckInterval, previous.recheck_interval_secs);

        Self {
            detector_model: store.get(SettingKey::DetectorModel, previous.detector_model),
            tolerance: if tolerance.is_finite() && tolerance > 0.0 {
                tolerance
            } else {
                previous.tolerance
            },
            detection_scale: if detection_scale.is_finite() {
                detection_scale.clamp(MIN_DETECTION_SCALE, MAX_DETECTION_SCALE)
            } else {
                previous.detection_scale
            },
            late_threshold_min: late_threshold_min.max(0),
            disappear_threshold_min: disappear_threshold_min.max(1),
            recheck_interval_secs: recheck_interval_secs.max(1),
            system_mode: store.get(SettingKey::SystemMode, previous.system_mode),
            frame_skip: store.get(SettingKey::FrameSkip, previous.frame_skip).max(1),
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            late_threshold: Duration::minutes(self.late_threshold_min),
            disappear_threshold: Duration::minutes(self.disappear_threshold_min),
            recheck_interval: Duration::seconds(self.recheck_interval_secs),
        }
    }
}

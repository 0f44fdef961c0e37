use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::attendance::domain::schedule::Schedule;
use crate::detection::domain::detector_model::DetectorModel;
use crate::shared::detection_result::DetectionResult;
use crate::shared::frame::Frame;
use crate::tracking::domain::tracker_set::TrackerSet;

use super::annotation::Overlay;
use super::pipeline_config::PipelineConfig;

/// What the detection loop last reported about the attendance session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub active_schedule: Option<Schedule>,
    pub logged: usize,
}

#[derive(Default)]
struct Slots {
    latest_frame: Option<Arc<Frame>>,
    /// Trackers published by detection and not yet picked up by capture.
    incoming: Option<TrackerSet>,
    detections: Vec<DetectionResult>,
    config: PipelineConfig,
    active_detector: Option<DetectorModel>,
    session: SessionSnapshot,
}

/// State exchanged between the capture and detection loops.
///
/// The frame/tracker mutex is held only to move values in or out; all
/// processing happens on copies. The output frame has its own lock so
/// stream readers never contend with the loops.
#[derive(Default)]
pub struct SharedState {
    slots: Mutex<Slots>,
    output: Mutex<Option<Arc<Frame>>>,
    capture_running: AtomicBool,
    detection_running: AtomicBool,
}

impl SharedState {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            slots: Mutex::new(Slots {
                config,
                ..Slots::default()
            }),
            ..Self::default()
        }
    }

    /// Overwrite the latest-frame slot.
    pub fn publish_frame(&self, frame: Frame) -> Arc<Frame> {
        let frame = Arc::new(frame);
        self.lock_slots().latest_frame = Some(Arc::clone(&frame));
        frame
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.lock_slots().latest_frame.clone()
    }

    /// Replace the tracker set and detection results of the previous cycle.
    pub fn publish_detections(&self, trackers: TrackerSet, detections: Vec<DetectionResult>) {
        let mut slots = self.lock_slots();
        slots.incoming = Some(trackers);
        slots.detections = detections;
    }

    /// Hand a freshly published tracker set to the capture loop, once.
    pub fn take_trackers(&self) -> Option<TrackerSet> {
        self.lock_slots().incoming.take()
    }

    pub fn detections(&self) -> Vec<DetectionResult> {
        self.lock_slots().detections.clone()
    }

    pub fn set_config(&self, config: PipelineConfig, active_detector: DetectorModel) {
        let mut slots = self.lock_slots();
        slots.config = config;
        slots.active_detector = Some(active_detector);
    }

    pub fn config(&self) -> PipelineConfig {
        self.lock_slots().config.clone()
    }

    pub fn active_detector(&self) -> Option<DetectorModel> {
        self.lock_slots().active_detector
    }

    pub fn overlay(&self) -> Overlay {
        let slots = self.lock_slots();
        Overlay {
            detection_scale: slots.config.detection_scale,
            mode: slots.config.system_mode,
        }
    }

    pub fn set_session(&self, session: SessionSnapshot) {
        self.lock_slots().session = session;
    }

    pub fn session(&self) -> SessionSnapshot {
        self.lock_slots().session.clone()
    }

    pub fn set_output(&self, frame: Frame) {
        *self.lock_output() = Some(Arc::new(frame));
    }

    pub fn output(&self) -> Option<Arc<Frame>> {
        self.lock_output().clone()
    }

    pub fn set_capture_running(&self, running: bool) {
        self.capture_running.store(running, Ordering::SeqCst);
    }

    pub fn capture_running(&self) -> bool {
        self.capture_running.load(Ordering::SeqCst)
    }

    pub fn set_detection_running(&self, running: bool) {
        self.detection_running.store(running, Ordering::SeqCst);
    }

    pub fn detection_running(&self) -> bool {
        self.detection_running.load(Ordering::SeqCst)
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_output(&self) -> MutexGuard<'_, Option<Arc<Frame>>> {
        match self.output.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

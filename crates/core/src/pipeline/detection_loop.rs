use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::attendance::domain::attendance_session::AttendanceSession;
use crate::attendance::domain::attendance_sink::AttendanceSink;
use crate::attendance::domain::schedule_resolver::ScheduleResolver;
use crate::attendance::domain::timetable_store::TimetableStore;
use crate::detection::domain::detector_model::DetectorModel;
use crate::detection::domain::face_detector::DetectorProvider;
use crate::detection::infrastructure::detector_factory::{create_detector, ActiveDetector};
use crate::recognition::domain::face_encoder::{EncoderProvider, FaceEncoder};
use crate::recognition::domain::gallery::Gallery;
use crate::settings::domain::settings_store::SettingsStore;
use crate::shared::clock::Clock;
use crate::shared::constants::UNKNOWN_NAME;
use crate::shared::detection_result::DetectionResult;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::stop_signal::StopSignal;
use crate::tracking::domain::tracker_set::TrackerSet;
use crate::tracking::domain::visual_tracker::{TrackerError, VisualTracker};
use crate::tracking::infrastructure::correlation_tracker::CorrelationTracker;

use super::attendance_pipeline::PipelineError;
use super::pipeline_config::PipelineConfig;
use super::pipeline_logger::{PeriodicPipelineLogger, PipelineLogger};
use super::shared_state::{SessionSnapshot, SharedState};

pub const DETECTION_INTERVAL: Duration = Duration::from_millis(30);
pub const NO_FRAME_WAIT: Duration = Duration::from_millis(100);

type StartTracker = fn(&Frame, &FaceBox) -> Result<Box<dyn VisualTracker>, TrackerError>;

/// Collaborators the detection loop is built from.
pub struct DetectionContext {
    pub state: Arc<SharedState>,
    pub settings: Arc<SettingsStore>,
    pub detectors: Arc<dyn DetectorProvider>,
    pub encoders: Arc<dyn EncoderProvider>,
    pub gallery: Arc<RwLock<Gallery>>,
    pub timetable: Arc<dyn TimetableStore>,
    pub sink: Arc<dyn AttendanceSink>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Capture has not published a frame yet.
    NoFrame,
    /// Bookkeeping ran but detection was not due for this frame.
    Skipped,
    Processed { faces: usize },
}

pub struct DetectionLoop {
    state: Arc<SharedState>,
    settings: Arc<SettingsStore>,
    detectors: Arc<dyn DetectorProvider>,
    detector: ActiveDetector,
    requested_model: DetectorModel,
    encoder: Box<dyn FaceEncoder>,
    gallery: Arc<RwLock<Gallery>>,
    resolver: ScheduleResolver,
    session: AttendanceSession,
    clock: Arc<dyn Clock>,
    logger: Box<dyn PipelineLogger>,
    start_tracker: StartTracker,
    config: PipelineConfig,
    last_frame: Option<Arc<Frame>>,
    fresh_frames: u64,
    generation: u64,
}

impl DetectionLoop {
    /// Build the detector and encoder for the current settings. Failing to
    /// construct either is fatal for the loop.
    pub fn new(ctx: DetectionContext) -> Result<Self, PipelineError> {
        let config = PipelineConfig::load(&ctx.settings, &ctx.state.config());
        let detector = create_detector(ctx.detectors.as_ref(), config.detector_model)?;
        let encoder = ctx
            .encoders
            .build()
            .map_err(|e| PipelineError::Encoder(e.to_string()))?;
        ctx.state.set_config(config.clone(), detector.model);

        Ok(Self {
            state: ctx.state,
            settings: ctx.settings,
            detectors: ctx.detectors,
            requested_model: config.detector_model,
            detector,
            encoder,
            gallery: ctx.gallery,
            resolver: ScheduleResolver::new(ctx.timetable),
            session: AttendanceSession::new(ctx.sink, config.session_policy()),
            clock: ctx.clock,
            logger: Box::new(PeriodicPipelineLogger::default()),
            start_tracker: CorrelationTracker::boxed,
            config,
            last_frame: None,
            fresh_frames: 0,
            generation: 0,
        })
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_tracker(mut self, start_tracker: StartTracker) -> Self {
        self.start_tracker = start_tracker;
        self
    }

    pub fn run(mut self, stop: StopSignal) {
        self.state.set_detection_running(true);
        while !stop.is_stopped() {
            let wait = match self.run_cycle() {
                CycleOutcome::NoFrame => NO_FRAME_WAIT,
                _ => DETECTION_INTERVAL,
            };
            if stop.wait(wait) {
                break;
            }
        }
        self.logger.summary();
        log::info!("Detection loop stopped");
        self.state.set_detection_running(false);
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        let Some(frame) = self.state.latest_frame() else {
            return CycleOutcome::NoFrame;
        };

        self.refresh_config();
        let now = self.clock.now();
        let schedule = self.resolver.resolve(self.config.system_mode, now);
        self.session.observe_schedule(schedule, now);
        self.publish_session();

        if !self.is_due(&frame) {
            return CycleOutcome::Skipped;
        }

        let scale = self.config.detection_scale;
        let small = frame.scaled(scale);

        let started = Instant::now();
        let boxes = match self.detector.detector.detect(&small) {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                Vec::new()
            }
        };
        self.logger.timing("detect", elapsed_ms(started));

        let started = Instant::now();
        let results = self.recognize(&small, &boxes, now);
        self.logger.timing("encode", elapsed_ms(started));
        self.publish_session();

        let results: Vec<DetectionResult> = results
            .into_iter()
            .map(|r| DetectionResult::new(r.face_box.unscaled(scale), r.name))
            .collect();

        let started = Instant::now();
        self.generation += 1;
        let trackers = TrackerSet::build(self.generation, &frame, &results, self.start_tracker);
        self.logger.timing("track", elapsed_ms(started));
        self.logger.metric("faces", results.len() as f64);
        self.logger.cycle_complete();

        let faces = results.len();
        self.state.publish_detections(trackers, results);
        CycleOutcome::Processed { faces }
    }

    /// Snapshot settings, swapping the detector and session policy when
    /// they changed.
    fn refresh_config(&mut self) {
        let config = PipelineConfig::load(&self.settings, &self.config);

        if config.detector_model != self.requested_model {
            match create_detector(self.detectors.as_ref(), config.detector_model) {
                Ok(active) => self.detector = active,
                Err(e) => log::error!("Keeping {} detector: {e}", self.detector.model),
            }
            self.requested_model = config.detector_model;
        }
        if config.session_policy() != self.config.session_policy() {
            self.session.set_policy(config.session_policy());
        }

        self.config = config;
        self.state.set_config(self.config.clone(), self.detector.model);
    }

    /// A frame is processed once, and only every `frame_skip`-th new frame.
    fn is_due(&mut self, frame: &Arc<Frame>) -> bool {
        if let Some(last) = &self.last_frame {
            if Arc::ptr_eq(last, frame) {
                return false;
            }
        }
        self.last_frame = Some(Arc::clone(frame));
        self.fresh_frames += 1;
        (self.fresh_frames - 1) % u64::from(self.config.frame_skip) == 0
    }

    /// Name every box and report recognized faces to the session.
    fn recognize(&mut self, frame: &Frame, boxes: &[FaceBox], now: DateTime<Local>) -> Vec<DetectionResult> {
        let gallery = Arc::clone(&self.gallery);
        let gallery = match gallery.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let tolerance = self.config.tolerance;
        let results: Vec<DetectionResult> = boxes
            .iter()
            .map(|face_box| {
                let name = match self.encoder.encode(frame, face_box) {
                    Ok(embedding) => gallery.identify(&embedding, tolerance),
                    Err(e) => {
                        log::debug!("Encoding skipped: {e}");
                        UNKNOWN_NAME.to_string()
                    }
                };
                DetectionResult::new(*face_box, name)
            })
            .collect();
        drop(gallery);

        for result in results.iter().filter(|r| r.is_known()) {
            self.session.record_sighting(&result.name, now);
        }
        results
    }

    fn publish_session(&self) {
        self.state.set_session(SessionSnapshot {
            active_schedule: self.session.active_schedule().cloned(),
            logged: self.session.logged_count(),
        });
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

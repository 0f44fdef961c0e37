use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use serde::Serialize;
use thiserror::Error;

use crate::attendance::domain::attendance_sink::{AttendanceSink, StudentDirectory};
use crate::attendance::domain::schedule::Schedule;
use crate::attendance::domain::system_mode::SystemMode;
use crate::attendance::domain::timetable_store::TimetableStore;
use crate::camera::domain::camera_connection::CameraConnection;
use crate::camera::domain::camera_registry::CameraRegistry;
use crate::camera::domain::frame_source::CameraBackend;
use crate::detection::domain::detector_model::DetectorModel;
use crate::detection::domain::face_detector::DetectorProvider;
use crate::detection::infrastructure::detector_factory::{create_detector, DetectorUnavailable};
use crate::recognition::domain::face_encoder::{EncoderError, EncoderProvider};
use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::gallery_store::GalleryStore;
use crate::settings::domain::setting_key::SettingKey;
use crate::settings::domain::settings_store::SettingsStore;
use crate::shared::clock::Clock;
use crate::shared::constants::UNKNOWN_NAME;
use crate::shared::frame::Frame;
use crate::shared::stop_signal::{StopSignal, StopTrigger};
use crate::shared::store_error::StoreError;

use super::capture_loop::CaptureLoop;
use super::detection_loop::{DetectionContext, DetectionLoop};
use super::frame_stream::{encode_jpeg, FrameStream};
use super::pipeline_config::PipelineConfig;
use super::shared_state::SharedState;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Detector(#[from] DetectorUnavailable),
    #[error("face encoder unavailable: {0}")]
    Encoder(String),
}

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("invalid student name '{0}'")]
    InvalidName(String),
    #[error("no face found in the image")]
    NoFace,
    #[error("expected exactly one face, found {0}")]
    MultipleFaces(usize),
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct PipelineDeps {
    pub camera_registry: Arc<dyn CameraRegistry>,
    pub camera_backend: Arc<dyn CameraBackend>,
    pub detectors: Arc<dyn DetectorProvider>,
    pub encoders: Arc<dyn EncoderProvider>,
    pub gallery_store: Arc<dyn GalleryStore>,
    pub timetable: Arc<dyn TimetableStore>,
    pub sink: Arc<dyn AttendanceSink>,
    pub students: Arc<dyn StudentDirectory>,
    pub settings: Arc<SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub mode: SystemMode,
    pub active_schedule: Option<Schedule>,
    pub students_loaded: usize,
    pub sessions_logged: usize,
    /// Faces found by the latest detection cycle.
    pub faces_in_view: usize,
    pub detection_scale: f64,
    pub tolerance: f64,
    pub detector: DetectorModel,
    pub capture_running: bool,
    pub detection_running: bool,
}

struct Run {
    trigger: StopTrigger,
    signal: StopSignal,
    capture: JoinHandle<()>,
    detection: Option<JoinHandle<()>>,
}

/// Control surface over the capture and detection loops.
///
/// A stopped pipeline holds no camera. `restart` reloads the gallery and
/// starts with fresh tracking and attendance state.
pub struct AttendancePipeline {
    deps: PipelineDeps,
    gallery: Arc<RwLock<Gallery>>,
    state: Arc<SharedState>,
    run: Option<Run>,
}

impl AttendancePipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let gallery = load_gallery(deps.gallery_store.as_ref());
        sync_students(deps.students.as_ref(), &gallery);
        let config = PipelineConfig::load(&deps.settings, &PipelineConfig::default());
        Self {
            deps,
            gallery: Arc::new(RwLock::new(gallery)),
            state: Arc::new(SharedState::new(config)),
            run: None,
        }
    }

    /// Spawn both loops. A detection loop that cannot be built is logged
    /// and left out; capture still runs so the stream stays live.
    pub fn start(&mut self) {
        if self.is_running() {
            log::info!("Pipeline already running");
            return;
        }
        self.stop();

        let (trigger, signal) = StopSignal::new();

        let detection = match DetectionLoop::new(self.detection_context()) {
            Ok(detection) => {
                self.state.set_detection_running(true);
                let stop = signal.clone();
                Some(std::thread::spawn(move || detection.run(stop)))
            }
            Err(e) => {
                log::error!("Detection loop not started: {e}");
                None
            }
        };

        let connection = CameraConnection::new(
            Arc::clone(&self.deps.camera_registry),
            Arc::clone(&self.deps.camera_backend),
        );
        let capture = CaptureLoop::new(connection, Arc::clone(&self.state));
        self.state.set_capture_running(true);
        let stop = signal.clone();
        let capture = std::thread::spawn(move || capture.run(stop));

        self.run = Some(Run {
            trigger,
            signal,
            capture,
            detection,
        });
        log::info!("Pipeline started");
    }

    /// Signal both loops and wait for them; the camera is released by the
    /// time this returns.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        run.trigger.fire();
        if run.capture.join().is_err() {
            log::error!("Capture loop panicked");
            self.state.set_capture_running(false);
        }
        if let Some(detection) = run.detection {
            if detection.join().is_err() {
                log::error!("Detection loop panicked");
                self.state.set_detection_running(false);
            }
        }
        log::info!("Pipeline stopped");
    }

    pub fn restart(&mut self) {
        self.stop();
        let gallery = load_gallery(self.deps.gallery_store.as_ref());
        sync_students(self.deps.students.as_ref(), &gallery);
        *self.write_gallery() = gallery;
        let config = PipelineConfig::load(&self.deps.settings, &self.state.config());
        self.state = Arc::new(SharedState::new(config));
        self.start();
        log::info!("Pipeline restarted");
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some() && (self.state.capture_running() || self.state.detection_running())
    }

    pub fn status(&self) -> PipelineStatus {
        let running = self.is_running();
        let config = if running {
            self.state.config()
        } else {
            PipelineConfig::load(&self.deps.settings, &self.state.config())
        };
        let session = self.state.session();

        PipelineStatus {
            running,
            mode: config.system_mode,
            active_schedule: if running { session.active_schedule } else { None },
            students_loaded: self.read_gallery().unique_names().len(),
            sessions_logged: session.logged,
            faces_in_view: if running { self.state.detections().len() } else { 0 },
            detection_scale: config.detection_scale,
            tolerance: config.tolerance,
            detector: self
                .state
                .active_detector()
                .unwrap_or(config.detector_model),
            capture_running: self.state.capture_running(),
            detection_running: self.state.detection_running(),
        }
    }

    /// Add `name` from an image holding exactly one face. The embedding is
    /// persisted first, then added to the in-memory gallery.
    pub fn enroll(&self, name: &str, frame: &Frame) -> Result<(), EnrollError> {
        let name = name.trim();
        if name.is_empty() || name == UNKNOWN_NAME {
            return Err(EnrollError::InvalidName(name.to_string()));
        }

        let config = PipelineConfig::load(&self.deps.settings, &self.state.config());
        let mut active = create_detector(self.deps.detectors.as_ref(), config.detector_model)
            .map_err(PipelineError::from)?;
        let boxes = active
            .detector
            .detect(frame)
            .map_err(|e| EnrollError::Detection(e.to_string()))?;
        let face = match boxes.as_slice() {
            [] => return Err(EnrollError::NoFace),
            [face] => *face,
            many => return Err(EnrollError::MultipleFaces(many.len())),
        };

        let mut encoder = self
            .deps
            .encoders
            .build()
            .map_err(|e| PipelineError::Encoder(e.to_string()))?;
        let embedding = encoder.encode(frame, &face)?;

        self.deps.gallery_store.append(name, &embedding)?;
        self.write_gallery().push(name, embedding);
        if let Err(e) = self.deps.students.ensure_students(&[name.to_string()]) {
            log::warn!("Student row for {name} not created: {e}");
        }
        log::info!("Enrolled {name}");
        Ok(())
    }

    pub fn set_mode(&self, mode: SystemMode) -> Result<(), StoreError> {
        self.deps.settings.set(SettingKey::SystemMode, mode)?;
        log::info!("System mode set to {mode}");
        Ok(())
    }

    /// JPEG frames for the current run. Ends immediately when stopped.
    pub fn frame_stream(&self) -> FrameStream {
        let signal = match &self.run {
            Some(run) => run.signal.clone(),
            None => StopSignal::new().1,
        };
        FrameStream::new(Arc::clone(&self.state), signal)
    }

    /// Most recent annotated frame as JPEG, if any.
    pub fn snapshot_jpeg(&self) -> Option<Vec<u8>> {
        let frame = self.state.output()?;
        match encode_jpeg(&frame) {
            Ok(jpeg) => Some(jpeg),
            Err(e) => {
                log::warn!("Snapshot encoding failed: {e}");
                None
            }
        }
    }

    fn detection_context(&self) -> DetectionContext {
        DetectionContext {
            state: Arc::clone(&self.state),
            settings: Arc::clone(&self.deps.settings),
            detectors: Arc::clone(&self.deps.detectors),
            encoders: Arc::clone(&self.deps.encoders),
            gallery: Arc::clone(&self.gallery),
            timetable: Arc::clone(&self.deps.timetable),
            sink: Arc::clone(&self.deps.sink),
            clock: Arc::clone(&self.deps.clock),
        }
    }

    fn read_gallery(&self) -> RwLockReadGuard<'_, Gallery> {
        match self.gallery.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_gallery(&self) -> RwLockWriteGuard<'_, Gallery> {
        match self.gallery.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for AttendancePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn load_gallery(store: &dyn GalleryStore) -> Gallery {
    match store.load() {
        Ok(gallery) => gallery,
        Err(e) => {
            log::warn!("Gallery unavailable ({e}), starting empty");
            Gallery::new()
        }
    }
}

fn sync_students(students: &dyn StudentDirectory, gallery: &Gallery) {
    match students.ensure_students(&gallery.unique_names()) {
        Ok(0) => {}
        Ok(added) => log::info!("Added {added} students from the gallery"),
        Err(e) => log::warn!("Student sync failed: {e}"),
    }
}

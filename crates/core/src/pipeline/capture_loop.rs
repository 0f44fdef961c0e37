use std::sync::Arc;
use std::time::Duration;

use crate::camera::domain::camera_connection::{CameraConnection, ConnectionError, ReadFailures};
use crate::camera::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;
use crate::shared::stop_signal::StopSignal;
use crate::tracking::domain::tracker_set::TrackerSet;

use super::annotation::annotate;
use super::shared_state::SharedState;

pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(30);

/// Reads the camera, publishes mirrored frames for detection and produces
/// the annotated output frame by advancing the current trackers.
pub struct CaptureLoop {
    connection: CameraConnection,
    state: Arc<SharedState>,
    failures: ReadFailures,
    trackers: TrackerSet,
}

impl CaptureLoop {
    pub fn new(connection: CameraConnection, state: Arc<SharedState>) -> Self {
        Self {
            connection,
            state,
            failures: ReadFailures::default(),
            trackers: TrackerSet::empty(),
        }
    }

    pub fn with_failures(mut self, failures: ReadFailures) -> Self {
        self.failures = failures;
        self
    }

    /// Run until `stop` fires or the camera backend is unusable. The camera
    /// is released before returning.
    pub fn run(mut self, stop: StopSignal) {
        self.state.set_capture_running(true);
        let Some(mut source) = self.connect(&stop) else {
            self.state.set_capture_running(false);
            return;
        };

        while !stop.is_stopped() {
            match source.read_frame() {
                Ok(frame) => {
                    self.failures.record_success();
                    self.process_frame(frame);
                }
                Err(e) => {
                    log::debug!("Frame read failed: {e}");
                    if self.failures.record_failure() {
                        log::warn!("Too many consecutive read failures, reconnecting camera");
                        drop(source);
                        match self.connect(&stop) {
                            Some(reopened) => source = reopened,
                            None => break,
                        }
                    }
                }
            }
            if stop.wait(CAPTURE_INTERVAL) {
                break;
            }
        }

        log::info!("Capture loop stopped");
        self.state.set_capture_running(false);
    }

    /// Mirror, publish and annotate one captured frame.
    pub fn process_frame(&mut self, frame: Frame) {
        let frame = self.state.publish_frame(frame.mirrored());
        if let Some(fresh) = self.state.take_trackers() {
            log::trace!(
                "Tracking {} faces from detection cycle {}",
                fresh.len(),
                fresh.generation()
            );
            self.trackers = fresh;
        }
        let faces = self.trackers.advance(&frame);
        let annotated = annotate(&frame, &faces, &self.state.overlay());
        self.state.set_output(annotated);
    }

    fn connect(&mut self, stop: &StopSignal) -> Option<Box<dyn FrameSource>> {
        match self.connection.open(stop) {
            Ok(source) => Some(source),
            Err(ConnectionError::Cancelled) => None,
            Err(e @ ConnectionError::Fatal(_)) => {
                log::error!("Capture loop exiting: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::backoff::Backoff;
    use crate::camera::domain::camera_config::CameraConfig;
    use crate::camera::domain::camera_registry::CameraRegistry;
    use crate::camera::domain::frame_source::{CameraBackend, CameraError};
    use crate::shared::detection_result::DetectionResult;
    use crate::shared::face_box::FaceBox;
    use crate::shared::store_error::StoreError;
    use crate::tracking::domain::visual_tracker::{TrackerError, VisualTracker};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct EmptyRegistry;

    impl CameraRegistry for EmptyRegistry {
        fn list_active(&self) -> Result<Vec<CameraConfig>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Plays back a script of reads; after the script every read fails.
    struct ScriptedSource {
        script: Vec<Result<Frame, CameraError>>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            if self.script.is_empty() {
                return Err(CameraError::Read("end of script".into()));
            }
            self.script.remove(0)
        }
    }

    struct ScriptedBackend {
        opens: AtomicUsize,
        scripts: Mutex<Vec<Vec<Result<Frame, CameraError>>>>,
        fatal: bool,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<Vec<Result<Frame, CameraError>>>) -> Self {
            Self {
                opens: AtomicUsize::new(0),
                scripts: Mutex::new(scripts),
                fatal: false,
            }
        }
    }

    impl CameraBackend for ScriptedBackend {
        fn open(&self, _camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fatal {
                return Err(CameraError::BackendUnavailable("no capture support".into()));
            }
            let mut scripts = self.scripts.lock().unwrap();
            let script = if scripts.is_empty() {
                Vec::new()
            } else {
                scripts.remove(0)
            };
            Ok(Box::new(ScriptedSource { script }))
        }
    }

    struct FixedTracker(FaceBox);

    impl VisualTracker for FixedTracker {
        fn update(&mut self, _frame: &Frame) -> Result<FaceBox, TrackerError> {
            Ok(self.0)
        }
    }

    fn black(index: u64) -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 3, index)
    }

    fn capture_loop(backend: Arc<ScriptedBackend>, state: Arc<SharedState>) -> CaptureLoop {
        let connection = CameraConnection::new(Arc::new(EmptyRegistry), backend)
            .with_backoff(Backoff::new(Duration::from_millis(1), Duration::from_millis(2)));
        CaptureLoop::new(connection, state)
    }

    #[test]
    fn test_process_frame_mirrors_and_publishes() {
        let state = Arc::new(SharedState::default());
        let mut capture = capture_loop(Arc::new(ScriptedBackend::new(vec![])), Arc::clone(&state));
        let mut data = vec![0u8; 64 * 48 * 3];
        data[0] = 255;
        capture.process_frame(Frame::new(data, 64, 48, 3, 4));

        let latest = state.latest_frame().unwrap();
        assert_eq!(latest.as_ndarray()[[0, 63, 0]], 255);
        assert_eq!(latest.as_ndarray()[[0, 0, 0]], 0);
        assert_eq!(state.output().unwrap().index(), 4);
    }

    #[test]
    fn test_fresh_trackers_are_drawn() {
        let state = Arc::new(SharedState::default());
        let mut capture = capture_loop(Arc::new(ScriptedBackend::new(vec![])), Arc::clone(&state));
        let detections = vec![DetectionResult::new(FaceBox::new(25, 50, 45, 20), "alice")];
        let set = TrackerSet::build(1, &black(0), &detections, |_, face| {
            Ok(Box::new(FixedTracker(*face)) as Box<dyn VisualTracker>)
        });
        state.publish_detections(set, detections);

        capture.process_frame(black(1));
        let output = state.output().unwrap();
        let arr = output.as_ndarray();
        assert_eq!([arr[[25, 35, 0]], arr[[25, 35, 1]], arr[[25, 35, 2]]], [0, 200, 0]);

        // The same set keeps being advanced on later frames.
        capture.process_frame(black(2));
        assert_eq!(state.output().unwrap().as_ndarray()[[25, 35, 1]], 200);
    }

    #[test]
    fn test_reconnects_after_failure_threshold() {
        let first: Vec<_> = (0..3)
            .map(|_| Err(CameraError::Read("glitch".into())))
            .collect();
        let second = vec![Ok(black(7))];
        let backend = Arc::new(ScriptedBackend::new(vec![first, second]));
        let state = Arc::new(SharedState::default());
        let capture = capture_loop(Arc::clone(&backend), Arc::clone(&state))
            .with_failures(ReadFailures::new(3));
        let (trigger, signal) = StopSignal::new();

        let handle = std::thread::spawn(move || capture.run(signal));
        let deadline = Instant::now() + Duration::from_secs(5);
        while state.latest_frame().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        trigger.fire();
        handle.join().unwrap();

        assert!(backend.opens.load(Ordering::SeqCst) >= 2);
        assert_eq!(state.latest_frame().unwrap().index(), 7);
        assert!(!state.capture_running());
    }

    #[test]
    fn test_fatal_backend_ends_loop() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.fatal = true;
        let state = Arc::new(SharedState::default());
        let capture = capture_loop(Arc::new(backend), Arc::clone(&state));
        let (_trigger, signal) = StopSignal::new();

        capture.run(signal);
        assert!(!state.capture_running());
        assert!(state.output().is_none());
    }
}

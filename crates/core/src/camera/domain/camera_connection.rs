use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::shared::stop_signal::StopSignal;

use super::backoff::Backoff;
use super::camera_config::CameraConfig;
use super::camera_registry::CameraRegistry;
use super::frame_source::{CameraBackend, CameraError, FrameSource};

/// Consecutive read failures that force a reconnect.
pub const FAILURE_THRESHOLD: u32 = 30;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("camera connection cancelled")]
    Cancelled,
    #[error(transparent)]
    Fatal(CameraError),
}

/// Owns camera selection and the open/retry policy.
///
/// Every attempt re-reads the registry, so a camera enabled while the
/// pipeline is retrying is picked up on the next attempt.
pub struct CameraConnection {
    registry: Arc<dyn CameraRegistry>,
    backend: Arc<dyn CameraBackend>,
    backoff: Backoff,
}

impl CameraConnection {
    pub fn new(registry: Arc<dyn CameraRegistry>, backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            registry,
            backend,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait the next failed open attempt will sleep for.
    pub fn retry_delay(&self) -> Duration {
        self.backoff.peek()
    }

    /// First enabled registry entry, or device 0 when the registry is empty
    /// or unreadable.
    pub fn active_camera(&self) -> CameraConfig {
        match self.registry.list_active() {
            Ok(cameras) => match cameras.into_iter().find(|c| c.enabled) {
                Some(camera) => camera,
                None => {
                    log::warn!("No enabled camera registered, using default device 0");
                    CameraConfig::default_device()
                }
            },
            Err(e) => {
                log::warn!("Camera registry unavailable ({e}), using default device 0");
                CameraConfig::default_device()
            }
        }
    }

    /// Open the active camera, retrying with backoff until it succeeds or
    /// `stop` fires. The wait between attempts is interruptible.
    pub fn open(&mut self, stop: &StopSignal) -> Result<Box<dyn FrameSource>, ConnectionError> {
        loop {
            if stop.is_stopped() {
                return Err(ConnectionError::Cancelled);
            }
            let camera = self.active_camera();
            match self.backend.open(&camera) {
                Ok(source) => {
                    self.backoff.reset();
                    log::info!("Camera '{}' opened ({})", camera.name, camera.source);
                    return Ok(source);
                }
                Err(e @ CameraError::BackendUnavailable(_)) => {
                    log::error!("{e}");
                    return Err(ConnectionError::Fatal(e));
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    log::warn!("{e}; retrying in {:.1}s", delay.as_secs_f64());
                    if stop.wait(delay) {
                        return Err(ConnectionError::Cancelled);
                    }
                }
            }
        }
    }
}

/// Consecutive read failure counter for the capture loop.
#[derive(Debug)]
pub struct ReadFailures {
    consecutive: u32,
    threshold: u32,
}

impl ReadFailures {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold: threshold.max(1),
        }
    }

    /// Count a failure. Returns `true` (and starts counting afresh) when the
    /// threshold is reached and the stream should be reopened.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            self.consecutive = 0;
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

impl Default for ReadFailures {
    fn default() -> Self {
        Self::new(FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::camera_config::VideoSource;
    use crate::shared::frame::Frame;
    use crate::shared::store_error::StoreError;
    use crate::shared::stop_signal::StopTrigger;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeRegistry {
        cameras: Option<Vec<CameraConfig>>,
    }

    impl CameraRegistry for FakeRegistry {
        fn list_active(&self) -> Result<Vec<CameraConfig>, StoreError> {
            self.cameras
                .clone()
                .ok_or_else(|| StoreError::Invalid("registry offline".into()))
        }
    }

    struct NullSource;

    impl FrameSource for NullSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            Err(CameraError::Read("empty".into()))
        }
    }

    /// Fails the first `failures` opens, recording every camera it was asked for.
    struct FlakyBackend {
        failures: usize,
        fatal: bool,
        opened: Mutex<Vec<VideoSource>>,
    }

    impl FlakyBackend {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                fatal: false,
                opened: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> usize {
            self.opened.lock().unwrap().len()
        }
    }

    impl CameraBackend for FlakyBackend {
        fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
            let mut opened = self.opened.lock().unwrap();
            opened.push(camera.source.clone());
            if self.fatal {
                return Err(CameraError::BackendUnavailable("no ffmpeg".into()));
            }
            if opened.len() <= self.failures {
                return Err(CameraError::Open {
                    source_desc: camera.source.to_string(),
                    reason: "busy".into(),
                });
            }
            Ok(Box::new(NullSource))
        }
    }

    fn camera(name: &str, source: VideoSource, enabled: bool) -> CameraConfig {
        CameraConfig {
            name: name.into(),
            source,
            enabled,
            priority: 0,
        }
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    fn connection(
        cameras: Option<Vec<CameraConfig>>,
        backend: Arc<FlakyBackend>,
    ) -> CameraConnection {
        CameraConnection::new(Arc::new(FakeRegistry { cameras }), backend).with_backoff(fast_backoff())
    }

    #[test]
    fn test_retries_until_open_succeeds() {
        let backend = Arc::new(FlakyBackend::new(3));
        let mut conn = connection(Some(vec![]), backend.clone());
        let (_trigger, stop) = StopSignal::new();

        assert!(conn.open(&stop).is_ok());
        assert_eq!(backend.attempts(), 4);
    }

    #[test]
    fn test_first_enabled_camera_is_used() {
        let backend = Arc::new(FlakyBackend::new(0));
        let cameras = vec![
            camera("Disabled", VideoSource::Device(3), false),
            camera("Door", VideoSource::Uri("rtsp://door".into()), true),
            camera("Back", VideoSource::Device(1), true),
        ];
        let mut conn = connection(Some(cameras), backend.clone());
        let (_trigger, stop) = StopSignal::new();

        conn.open(&stop).unwrap();
        assert_eq!(
            backend.opened.lock().unwrap()[0],
            VideoSource::Uri("rtsp://door".into())
        );
    }

    #[test]
    fn test_registry_failure_falls_back_to_device_zero() {
        let backend = Arc::new(FlakyBackend::new(0));
        let mut conn = connection(None, backend.clone());
        let (_trigger, stop) = StopSignal::new();

        conn.open(&stop).unwrap();
        assert_eq!(backend.opened.lock().unwrap()[0], VideoSource::Device(0));
    }

    #[test]
    fn test_stop_cancels_retry_loop() {
        let backend = Arc::new(FlakyBackend::new(usize::MAX));
        let mut conn = CameraConnection::new(Arc::new(FakeRegistry { cameras: None }), backend);
        let (trigger, stop) = StopSignal::new();

        let handle = std::thread::spawn(move || conn.open(&stop).err());
        std::thread::sleep(Duration::from_millis(30));
        trigger.fire();

        let result = handle.join().unwrap();
        assert!(matches!(result, Some(ConnectionError::Cancelled)));
    }

    #[test]
    fn test_already_stopped_never_opens() {
        let backend = Arc::new(FlakyBackend::new(0));
        let mut conn = connection(Some(vec![]), backend.clone());
        let (trigger, stop) = StopSignal::new();
        trigger.fire();

        assert!(matches!(conn.open(&stop), Err(ConnectionError::Cancelled)));
        assert_eq!(backend.attempts(), 0);
    }

    #[test]
    fn test_unavailable_backend_is_fatal() {
        let backend = Arc::new(FlakyBackend {
            fatal: true,
            ..FlakyBackend::new(0)
        });
        let mut conn = connection(Some(vec![]), backend.clone());
        let (_trigger, stop) = StopSignal::new();

        assert!(matches!(conn.open(&stop), Err(ConnectionError::Fatal(_))));
        assert_eq!(backend.attempts(), 1);
    }

    enum Attempt {
        Fail,
        /// Fail and fire the stop signal, so `open` returns right after
        /// drawing its next delay.
        FailAndStop,
        Open,
    }

    struct ScriptedBackend {
        script: Mutex<VecDeque<Attempt>>,
        trigger: Mutex<Option<StopTrigger>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Attempt>, trigger: StopTrigger) -> Self {
            Self {
                script: Mutex::new(script.into()),
                trigger: Mutex::new(Some(trigger)),
            }
        }
    }

    impl CameraBackend for ScriptedBackend {
        fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
            let busy = || CameraError::Open {
                source_desc: camera.source.to_string(),
                reason: "busy".into(),
            };
            match self.script.lock().unwrap().pop_front() {
                Some(Attempt::Open) => Ok(Box::new(NullSource)),
                Some(Attempt::FailAndStop) => {
                    if let Some(trigger) = self.trigger.lock().unwrap().take() {
                        trigger.fire();
                    }
                    Err(busy())
                }
                Some(Attempt::Fail) | None => Err(busy()),
            }
        }
    }

    #[test]
    fn test_open_doubles_delay_then_resets_after_success() {
        let ms = Duration::from_millis;
        let (trigger, stop) = StopSignal::new();
        let backend = Arc::new(ScriptedBackend::new(
            vec![
                Attempt::Fail,
                Attempt::Fail,
                Attempt::Open,
                Attempt::FailAndStop,
            ],
            trigger,
        ));
        let mut conn = CameraConnection::new(Arc::new(FakeRegistry { cameras: None }), backend)
            .with_backoff(Backoff::new(ms(1), ms(64)));
        assert_eq!(conn.retry_delay(), ms(1));

        // Two failures wait 1 ms then 2 ms; the success resets to the start.
        assert!(conn.open(&stop).is_ok());
        assert_eq!(conn.retry_delay(), ms(1));

        // The first failure after a success waits the initial delay again.
        assert!(matches!(conn.open(&stop), Err(ConnectionError::Cancelled)));
        assert_eq!(conn.retry_delay(), ms(2));
    }

    #[test]
    fn test_open_uses_doubling_sequence() {
        let ms = Duration::from_millis;
        let (trigger, stop) = StopSignal::new();
        let backend = Arc::new(ScriptedBackend::new(
            vec![Attempt::Fail, Attempt::Fail, Attempt::FailAndStop],
            trigger,
        ));
        let mut conn = CameraConnection::new(Arc::new(FakeRegistry { cameras: None }), backend)
            .with_backoff(Backoff::new(ms(1), ms(64)));

        // Waited 1, 2 and drew 4 before noticing the stop.
        assert!(matches!(conn.open(&stop), Err(ConnectionError::Cancelled)));
        assert_eq!(conn.retry_delay(), ms(8));
    }

    #[test]
    fn test_read_failures_trigger_at_threshold() {
        let mut failures = ReadFailures::new(3);
        assert!(!failures.record_failure());
        assert!(!failures.record_failure());
        assert!(failures.record_failure());
        assert_eq!(failures.consecutive(), 0);
    }

    #[test]
    fn test_read_success_resets_count() {
        let mut failures = ReadFailures::default();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            assert!(!failures.record_failure());
        }
        failures.record_success();
        assert!(!failures.record_failure());
        assert_eq!(failures.consecutive(), 1);
    }
}

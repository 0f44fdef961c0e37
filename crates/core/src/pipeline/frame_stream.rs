use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageResult};

use crate::shared::frame::Frame;
use crate::shared::stop_signal::StopSignal;

use super::shared_state::SharedState;

pub const JPEG_QUALITY: u8 = 80;
pub const MJPEG_BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const STREAM_INTERVAL: Duration = Duration::from_millis(33);
const EMPTY_POLL: Duration = Duration::from_millis(10);

pub fn encode_jpeg(frame: &Frame) -> ImageResult<Vec<u8>> {
    let color = match frame.channels() {
        1 => ExtendedColorType::L8,
        4 => ExtendedColorType::Rgba8,
        _ => ExtendedColorType::Rgb8,
    };
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode(
        frame.data(),
        frame.width(),
        frame.height(),
        color,
    )?;
    Ok(buf)
}

/// One part of a `multipart/x-mixed-replace` MJPEG response.
pub fn mjpeg_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// JPEG frames from the output slot at roughly 30 fps.
///
/// Waits while nothing has been annotated yet and ends once the pipeline
/// run it was created for stops.
pub struct FrameStream {
    state: Arc<SharedState>,
    stop: StopSignal,
    started: bool,
}

impl FrameStream {
    pub fn new(state: Arc<SharedState>, stop: StopSignal) -> Self {
        Self {
            state,
            stop,
            started: false,
        }
    }
}

impl Iterator for FrameStream {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started && self.stop.wait(STREAM_INTERVAL) {
            return None;
        }
        self.started = true;

        loop {
            if self.stop.is_stopped() {
                return None;
            }
            if let Some(frame) = self.state.output() {
                match encode_jpeg(&frame) {
                    Ok(jpeg) => return Some(jpeg),
                    Err(e) => log::debug!("Skipping frame {}: {e}", frame.index()),
                }
            }
            if self.stop.wait(EMPTY_POLL) {
                return None;
            }
        }
    }
}

use crate::camera::domain::camera_config::{CameraConfig, VideoSource};
use crate::camera::domain::frame_source::{CameraBackend, CameraError, FrameSource};
use crate::shared::frame::Frame;

/// Packets read while waiting for one decodable frame before giving up.
const MAX_PACKETS_PER_FRAME: usize = 256;

const CAPTURE_FRAMERATE: &str = "30";

/// Socket and read timeout for network streams, in microseconds. A stalled
/// stream then surfaces as a read error instead of blocking the capture loop.
const STREAM_TIMEOUT_US: &str = "5000000";

#[cfg(target_os = "linux")]
const DEVICE_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const DEVICE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const DEVICE_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEVICE_FORMAT: &str = "";

/// Opens local capture devices and network/file streams through
/// libavdevice + libavformat.
#[derive(Debug, Default)]
pub struct FfmpegCameraBackend;

impl FfmpegCameraBackend {
    pub fn new() -> Self {
        Self
    }

    fn open_device(&self, index: u32) -> Result<ffmpeg_next::format::context::Input, CameraError> {
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == DEVICE_FORMAT)
            .ok_or_else(|| {
                CameraError::BackendUnavailable(format!(
                    "capture device format '{DEVICE_FORMAT}' is not available in this ffmpeg build"
                ))
            })?;

        let url = device_url(index);
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("framerate", CAPTURE_FRAMERATE);

        let context = ffmpeg_next::format::open_with(
            &url,
            &ffmpeg_next::format::format::Format::Input(format),
            options,
        )
        .map_err(|e| open_error(&url, e))?;

        match context {
            ffmpeg_next::format::context::Context::Input(input) => Ok(input),
            ffmpeg_next::format::context::Context::Output(_) => Err(CameraError::Open {
                source_desc: url,
                reason: "device opened as an output".to_string(),
            }),
        }
    }

    fn open_uri(&self, uri: &str) -> Result<ffmpeg_next::format::context::Input, CameraError> {
        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in stream_options(uri) {
            options.set(key, value);
        }
        ffmpeg_next::format::input_with_dictionary(uri, options).map_err(|e| open_error(uri, e))
    }
}

fn stream_options(uri: &str) -> Vec<(&'static str, &'static str)> {
    let mut options = vec![("rw_timeout", STREAM_TIMEOUT_US)];
    if uri.starts_with("rtsp://") {
        options.push(("rtsp_transport", "tcp"));
        options.push(("timeout", STREAM_TIMEOUT_US));
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        options.push(("timeout", STREAM_TIMEOUT_US));
    }
    options
}

impl CameraBackend for FfmpegCameraBackend {
    fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
        ffmpeg_next::init().map_err(|e| CameraError::BackendUnavailable(e.to_string()))?;

        let ictx = match &camera.source {
            VideoSource::Device(index) => self.open_device(*index)?,
            VideoSource::Uri(uri) => self.open_uri(uri)?,
        };
        Ok(Box::new(FfmpegCamera::from_input(ictx, &camera.source)?))
    }
}

/// A live ffmpeg input decoded to RGB24 frames.
pub struct FfmpegCamera {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<Scaler>,
    stream_index: usize,
    next_index: u64,
}

/// RGB converter for one input geometry; rebuilt when the stream changes.
struct Scaler {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegCamera is owned by the capture loop and only used from that
// thread. The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    fn from_input(
        ictx: ffmpeg_next::format::context::Input,
        source: &VideoSource,
    ) -> Result<Self, CameraError> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::Open {
                source_desc: source.to_string(),
                reason: "no video stream".to_string(),
            })?;
        let stream_index = stream.index();

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CameraError::Open {
                source_desc: source.to_string(),
                reason: e.to_string(),
            })?;

        log::debug!(
            "Camera stream {}: {}x{} {:?}",
            source,
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Self {
            ictx,
            decoder,
            scaler: None,
            stream_index,
            next_index: 0,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, CameraError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        Some(self.convert(&decoded))
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<Frame, CameraError> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.format != format || s.width != width || s.height != height);
        if stale {
            let context = ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| CameraError::Read(format!("cannot convert {format:?}: {e}")))?;
            self.scaler = Some(Scaler {
                context,
                format,
                width,
                height,
            });
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(CameraError::Read("no pixel converter".to_string()));
        };

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler
            .context
            .run(decoded, &mut rgb_frame)
            .map_err(|e| CameraError::Read(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.next_index);
        self.next_index += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegCamera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if let Some(result) = self.try_receive() {
            return result;
        }

        for _ in 0..MAX_PACKETS_PER_FRAME {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                return self
                    .try_receive()
                    .unwrap_or_else(|| Err(CameraError::Read("end of stream".to_string())));
            };

            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
                continue;
            }
            if let Some(result) = self.try_receive() {
                return result;
            }
        }

        Err(CameraError::Read(format!(
            "no frame decoded after {MAX_PACKETS_PER_FRAME} packets"
        )))
    }
}

fn device_url(index: u32) -> String {
    if cfg!(target_os = "linux") {
        format!("/dev/video{index}")
    } else if cfg!(target_os = "windows") {
        format!("video={index}")
    } else {
        index.to_string()
    }
}

fn open_error(source_desc: &str, e: ffmpeg_next::Error) -> CameraError {
    CameraError::Open {
        source_desc: source_desc.to_string(),
        reason: e.to_string(),
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

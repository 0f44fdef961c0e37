use std::time::SystemTime;

use image::{imageops, RgbImage};
use ndarray::ArrayView3;

use super::face_box::FaceBox;

/// A captured camera frame: contiguous RGB bytes in row-major order.
///
/// Frames are immutable once published to the shared slot; derived frames
/// (mirrored, downscaled, annotated) are new values.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: u64,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            captured_at: SystemTime::now(),
        }
    }

    /// Wrap a decoded RGB image (enrollment photos, test fixtures).
    pub fn from_rgb_image(image: RgbImage, index: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Monotonic sequence number assigned by the capture loop.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Horizontal flip, keeping index and capture time.
    pub fn mirrored(&self) -> Frame {
        let row_len = self.width as usize * self.channels as usize;
        let px = self.channels as usize;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len.max(1)) {
            for pixel in row.chunks_exact(px.max(1)).rev() {
                data.extend_from_slice(pixel);
            }
        }
        self.derive(data, self.width, self.height)
    }

    /// Resize by `factor` (0 < factor <= 1 in practice). Returns a clone
    /// when the factor leaves the size unchanged.
    pub fn scaled(&self, factor: f64) -> Frame {
        let width = ((self.width as f64 * factor).round() as u32).max(1);
        let height = ((self.height as f64 * factor).round() as u32).max(1);
        if (width, height) == (self.width, self.height) || self.channels != 3 {
            return self.clone();
        }
        let Some(image) = RgbImage::from_raw(self.width, self.height, self.data.clone()) else {
            return self.clone();
        };
        let resized = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
        self.derive(resized.into_raw(), width, height)
    }

    /// Copy the pixels inside `face` (clamped to the frame) as a tightly packed
    /// RGB buffer. Returns `None` when the clamped box is empty.
    pub fn crop(&self, face: &FaceBox) -> Option<(Vec<u8>, u32, u32)> {
        let clamped = face.clamp_to(self.width, self.height);
        if clamped.width() <= 0 || clamped.height() <= 0 {
            return None;
        }
        let px = self.channels as usize;
        let stride = self.width as usize * px;
        let (left, top) = (clamped.left as usize, clamped.top as usize);
        let (w, h) = (clamped.width() as usize, clamped.height() as usize);

        let mut pixels = Vec::with_capacity(w * h * px);
        for row in top..top + h {
            let start = row * stride + left * px;
            pixels.extend_from_slice(&self.data[start..start + w * px]);
        }
        Some((pixels, w as u32, h as u32))
    }

    /// Rec. 601 luma of the pixel at `(x, y)`; 0 outside the frame.
    pub fn luma_at(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0.0;
        }
        let px = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * px;
        if px < 3 {
            return self.data[offset] as f32;
        }
        0.299 * self.data[offset] as f32
            + 0.587 * self.data[offset + 1] as f32
            + 0.114 * self.data[offset + 2] as f32
    }

    fn derive(&self, data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
            channels: self.channels,
            index: self.index,
            captured_at: self.captured_at,
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

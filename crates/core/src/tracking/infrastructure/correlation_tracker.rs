//! Template tracker using normalized cross-correlation on a sparse luma grid.
//!
//! The face is sampled on a grid of at most `TEMPLATE_SAMPLES` points along
//! its longer side. Each update searches whole-grid-step offsets within
//! `SEARCH_RADIUS` steps of the last position and moves to the best match.

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::tracking::domain::visual_tracker::{TrackerError, VisualTracker};

const TEMPLATE_SAMPLES: i32 = 24;
const MIN_SAMPLES: i32 = 4;
const SEARCH_RADIUS: i32 = 6;

/// Peak correlation under which the face counts as lost.
const MIN_CORRELATION: f32 = 0.35;

/// Weight of the newest appearance when refreshing the template.
const TEMPLATE_BLEND: f32 = 0.1;

pub struct CorrelationTracker {
    template: Vec<f32>,
    cols: i32,
    rows: i32,
    step: i32,
    position: FaceBox,
    scratch: Vec<f32>,
}

impl CorrelationTracker {
    pub fn start(frame: &Frame, face: &FaceBox) -> Result<Self, TrackerError> {
        let clamped = face.clamp_to(frame.width(), frame.height());
        let longest = clamped.width().max(clamped.height());
        if longest <= 0 {
            return Err(TrackerError::TooSmall(*face));
        }
        let step = ((longest + TEMPLATE_SAMPLES - 1) / TEMPLATE_SAMPLES).max(1);
        let cols = clamped.width() / step;
        let rows = clamped.height() / step;
        if cols < MIN_SAMPLES || rows < MIN_SAMPLES {
            return Err(TrackerError::TooSmall(*face));
        }

        let mut template = Vec::with_capacity((cols * rows) as usize);
        sample_grid(frame, clamped.left, clamped.top, cols, rows, step, &mut template);
        if !normalize(&mut template) {
            return Err(TrackerError::Featureless);
        }

        Ok(Self {
            template,
            cols,
            rows,
            step,
            position: clamped,
            scratch: Vec::with_capacity((cols * rows) as usize),
        })
    }

    /// Boxed constructor matching the tracker-set factory signature.
    pub fn boxed(frame: &Frame, face: &FaceBox) -> Result<Box<dyn VisualTracker>, TrackerError> {
        Ok(Box::new(Self::start(frame, face)?))
    }

    fn fits(&self, frame: &Frame, left: i32, top: i32) -> bool {
        left >= 0
            && top >= 0
            && left + self.cols * self.step <= frame.width() as i32
            && top + self.rows * self.step <= frame.height() as i32
    }
}

impl VisualTracker for CorrelationTracker {
    fn update(&mut self, frame: &Frame) -> Result<FaceBox, TrackerError> {
        let mut best: Option<(f32, i32, i32)> = None;

        for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
            for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
                let left = self.position.left + dx * self.step;
                let top = self.position.top + dy * self.step;
                if !self.fits(frame, left, top) {
                    continue;
                }
                sample_grid(frame, left, top, self.cols, self.rows, self.step, &mut self.scratch);
                if !normalize(&mut self.scratch) {
                    continue;
                }
                let score = dot(&self.template, &self.scratch);
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, dx, dy));
                }
            }
        }

        let (score, dx, dy) = best.ok_or(TrackerError::TargetLost)?;
        if score < MIN_CORRELATION {
            return Err(TrackerError::TargetLost);
        }

        self.position = self.position.translated(dx * self.step, dy * self.step);
        sample_grid(
            frame,
            self.position.left,
            self.position.top,
            self.cols,
            self.rows,
            self.step,
            &mut self.scratch,
        );
        if normalize(&mut self.scratch) {
            for (t, s) in self.template.iter_mut().zip(&self.scratch) {
                *t = (1.0 - TEMPLATE_BLEND) * *t + TEMPLATE_BLEND * s;
            }
            normalize(&mut self.template);
        }
        Ok(self.position)
    }
}

fn sample_grid(frame: &Frame, left: i32, top: i32, cols: i32, rows: i32, step: i32, out: &mut Vec<f32>) {
    out.clear();
    for r in 0..rows {
        for c in 0..cols {
            out.push(frame.luma_at(left + c * step, top + r * step));
        }
    }
}

/// Zero-mean, unit-norm in place. Returns `false` for a flat patch.
fn normalize(v: &mut [f32]) -> bool {
    if v.is_empty() {
        return false;
    }
    let mean = v.iter().sum::<f32>() / v.len() as f32;
    for x in v.iter_mut() {
        *x -= mean;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-3 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

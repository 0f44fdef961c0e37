/// ArcFace face encoder using ONNX Runtime.
///
/// Crops the detected box, resizes it to the model's 112×112 input and
/// returns an L2-normalized embedding (512-d for `w600k_r50`).
use std::path::{Path, PathBuf};

use crate::detection::infrastructure::onnx_session;
use crate::recognition::domain::face_encoder::{EncoderError, EncoderProvider, FaceEncoder};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxArcfaceEncoder {
    session: ort::session::Session,
}

impl OnnxArcfaceEncoder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: onnx_session::load_session(model_path)?,
        })
    }

    fn embed(&mut self, tensor: ndarray::Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceEncoder for OnnxArcfaceEncoder {
    fn encode(&mut self, frame: &Frame, face: &FaceBox) -> Result<Vec<f32>, EncoderError> {
        let (pixels, width, height) = frame.crop(face).ok_or(EncoderError::EmptyCrop(*face))?;
        let tensor = preprocess(&pixels, width, height);
        self.embed(tensor)
            .map_err(|e| EncoderError::Inference(e.to_string()))
    }
}

/// Loads a fresh ArcFace session from a resolved model file.
#[derive(Clone, Debug)]
pub struct OnnxEncoderProvider {
    model_path: PathBuf,
}

impl OnnxEncoderProvider {
    pub fn new(model_path: PathBuf) -> Self {
        Self { model_path }
    }
}

impl EncoderProvider for OnnxEncoderProvider {
    fn build(&self) -> Result<Box<dyn FaceEncoder>, Box<dyn std::error::Error>> {
        Ok(Box::new(OnnxArcfaceEncoder::new(&self.model_path)?))
    }
}

/// Resize crop to 112x112, normalize to [-1, 1], NCHW layout.
fn preprocess(rgb_data: &[u8], width: u32, height: u32) -> ndarray::Array4<f32> {
    let src_w = width as usize;
    let src_h = height as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * 3;
            if offset + 2 < rgb_data.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (rgb_data[offset + c] as f32 - NORM_MEAN) / NORM_STD;
                }
            }
        }
    }

    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

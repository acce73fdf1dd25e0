// src/embedding.rs - Image to feature vector through a pretrained embedding network

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use log::info;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::config::{Config, TensorLayout};
use crate::errors::{WheatRustError, Result};
use crate::image_utils::resize_image;

/// Maps an image to a fixed-length feature vector
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &RgbImage) -> Result<Vec<f32>>;
}

/// Resize to `size x size` and scale samples to [0, 1] in a batch of one
pub fn preprocess(image: &RgbImage, size: u32, layout: TensorLayout) -> Array4<f32> {
    let resized = resize_image(image, [size, size]);
    let s = size as usize;

    let shape = match layout {
        TensorLayout::Nhwc => (1, s, s, 3),
        TensorLayout::Nchw => (1, 3, s, s),
    };
    let mut input = Array4::<f32>::zeros(shape);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => input[[0, y, x, c]] = value,
                TensorLayout::Nchw => input[[0, c, y, x]] = value,
            }
        }
    }

    input
}

/// ONNX Runtime backed embedding model.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent requests take turns on the forward pass.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    input_size: u32,
    layout: TensorLayout,
}

fn model_load_error(path: &Path, e: impl std::fmt::Display) -> WheatRustError {
    WheatRustError::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn inference_error(stage: &str, e: impl std::fmt::Display) -> WheatRustError {
    WheatRustError::Inference(format!("{}: {}", stage, e))
}

impl OnnxEmbedder {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32, layout: TensorLayout) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(model_load_error(path, "file not found"));
        }

        info!("Loading embedding model from {}", path.display());
        let session = Session::builder()
            .map_err(|e| model_load_error(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_load_error(path, e))?
            .commit_from_file(path)
            .map_err(|e| model_load_error(path, e))?;

        info!("Embedding model ready ({}x{} input, {:?})", input_size, input_size, layout);

        Ok(Self {
            session: Mutex::new(session),
            input_size,
            layout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::load(&config.model_path, config.input_size, config.input_layout)
    }
}

impl FeatureExtractor for OnnxEmbedder {
    fn extract(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let input = preprocess(image, self.input_size, self.layout);
        let tensor = Tensor::from_array(input).map_err(|e| inference_error("input tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| WheatRustError::Inference("model session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| inference_error("forward pass", e))?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_error("output tensor", e))?;

        Ok(data.to_vec())
    }
}

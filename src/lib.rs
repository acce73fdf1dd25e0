// src/lib.rs - Library interface for the wheat rust analyzer

pub mod classifier;
pub mod color;
pub mod config;
pub mod contrast;
pub mod embedding;
pub mod errors;
pub mod gate;
pub mod image_io;
pub mod image_utils;
pub mod morphology;
pub mod output;
pub mod pipeline;
pub mod reference_bank;
pub mod render;
pub mod segmentation;
pub mod severity;

// Re-export commonly used types and functions
pub use errors::{WheatRustError, Result};
pub use config::{Config, TensorLayout};
pub use severity::SeverityLabel;
pub use image_io::{decode_rgb, read_input_file, InputFile};

pub use pipeline::{
    Diagnoser,
    DiagnosisRequest,
    DiagnosisResult,
    Outcome,
    Rejection,
    UploadedFile,
};

// Re-export the pipeline stages
pub use classifier::{LinearScanIndex, Neighbor, NeighborIndex};
pub use embedding::{FeatureExtractor, OnnxEmbedder};
pub use gate::{is_likely_wheat, leaf_fraction};
pub use reference_bank::ReferenceBank;
pub use render::{render_infection_highlight, render_mask_visualization};
pub use segmentation::{segment, Segmentation, SegmentationParams};

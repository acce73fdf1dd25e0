// src/pipeline.rs - Upload validation and the image-to-diagnosis sequence

use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::classifier::{LinearScanIndex, NeighborIndex};
use crate::config::Config;
use crate::embedding::{FeatureExtractor, OnnxEmbedder};
use crate::errors::{WheatRustError, Result};
use crate::gate;
use crate::image_io::{decode_rgb, encode_gray_base64, encode_rgb_base64};
use crate::reference_bank::ReferenceBank;
use crate::render::{render_infection_highlight, render_mask_visualization};
use crate::segmentation::{segment, Segmentation, SegmentationParams};
use crate::severity::SeverityLabel;

/// Identifier echoed back when the caller supplies none
pub const UNKNOWN_IMAGE_ID: &str = "unknown";

/// Uploaded file as received from the caller
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One diagnosis request; the image id is passed through untouched
#[derive(Debug, Clone, Default)]
pub struct DiagnosisRequest {
    pub image_id: Option<String>,
    pub file: Option<UploadedFile>,
}

impl DiagnosisRequest {
    pub fn new(image_id: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            file: Some(UploadedFile {
                filename: filename.into(),
                bytes,
            }),
        }
    }

    pub fn image_id(&self) -> &str {
        self.image_id.as_deref().unwrap_or(UNKNOWN_IMAGE_ID)
    }
}

/// Why a request was turned away before analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Invalid Image.")]
    DisallowedExtension { filename: String },

    #[error("Invalid image data.")]
    UndecodableImage,

    #[error("Invalid input: please upload a wheat crop image.")]
    NotWheat { leaf_fraction: f64 },
}

impl Rejection {
    /// Stable machine-checkable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingFile => "missing file",
            Rejection::EmptyFilename => "empty filename",
            Rejection::DisallowedExtension { .. } => "disallowed extension",
            Rejection::UndecodableImage => "undecodable image",
            Rejection::NotWheat { .. } => "not wheat",
        }
    }

    /// Message suitable for showing to the uploader
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Domain rejections come from the image content, not from a malformed upload
    pub fn is_domain_rejection(&self) -> bool {
        matches!(self, Rejection::NotWheat { .. })
    }
}

/// Serializable form of a rejection
#[derive(Debug, Clone, Serialize)]
pub struct RejectionRecord {
    pub image_id: String,
    pub error: String,
    pub reason: &'static str,
}

/// Successful diagnosis
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisResult {
    pub image_id: String,
    pub predicted_class: SeverityLabel,
    pub infected_percentage: u8,
    pub infected_pixels: u64,
    /// Leaf pixels that are not infected
    pub green_pixels: u64,
    /// Percentage immediately followed by the class, e.g. `35MS`
    pub result: String,
    /// Base64 PNG of the single-channel mask visualization
    pub green_mask: String,
    /// Base64 PNG of the RGB infection highlight
    pub infected_highlight: String,

    #[serde(skip)]
    pub mask_visualization: GrayImage,
    #[serde(skip)]
    pub highlight: RgbImage,
}

/// Outcome of a request that did not hit an infrastructure failure
#[derive(Debug, Clone)]
pub enum Outcome {
    Diagnosed(DiagnosisResult),
    Rejected {
        image_id: String,
        rejection: Rejection,
    },
}

impl Outcome {
    pub fn image_id(&self) -> &str {
        match self {
            Outcome::Diagnosed(result) => &result.image_id,
            Outcome::Rejected { image_id, .. } => image_id,
        }
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisResult> {
        match self {
            Outcome::Diagnosed(result) => Some(result),
            Outcome::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Diagnosed(_) => None,
            Outcome::Rejected { rejection, .. } => Some(rejection),
        }
    }

    /// JSON body for the caller: the diagnosis fields or `{error, reason}`
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            Outcome::Diagnosed(result) => serde_json::to_value(result)?,
            Outcome::Rejected { image_id, rejection } => serde_json::to_value(RejectionRecord {
                image_id: image_id.clone(),
                error: rejection.message(),
                reason: rejection.reason(),
            })?,
        };
        Ok(value)
    }
}

/// Check the file name's extension against the allowed list, case-insensitively
pub fn has_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Immutable diagnosis context: embedding model, reference index and thresholds.
///
/// Built once at startup and shared read-only by every request.
pub struct Diagnoser {
    extractor: Box<dyn FeatureExtractor>,
    index: Box<dyn NeighborIndex>,
    segmentation: SegmentationParams,
    min_leaf_fraction: f64,
    blur_kernel_size: u32,
    allowed_extensions: Vec<String>,
    use_parallel: bool,
}

impl Diagnoser {
    pub fn new(
        config: &Config,
        extractor: Box<dyn FeatureExtractor>,
        index: Box<dyn NeighborIndex>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            extractor,
            index,
            segmentation: SegmentationParams::from(config),
            min_leaf_fraction: config.wheat_min_leaf_fraction,
            blur_kernel_size: config.blur_kernel_size,
            allowed_extensions: config.allowed_extensions.clone(),
            use_parallel: config.use_parallel,
        })
    }

    /// Load the model and reference bank named in the config.
    ///
    /// Any failure here means the service cannot answer requests at all.
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = OnnxEmbedder::from_config(config)?;
        let bank = ReferenceBank::load(&config.features_path, &config.labels_path)?;
        let diagnoser = Self::new(config, Box::new(extractor), Box::new(LinearScanIndex::new(bank)))?;
        diagnoser.verify_feature_width(config.input_size)?;
        Ok(diagnoser)
    }

    /// Run one blank image through the model and compare its width with the bank
    pub fn verify_feature_width(&self, input_size: u32) -> Result<()> {
        let probe = self.extractor.extract(&RgbImage::new(input_size, input_size))?;
        if probe.len() != self.index.dimension() {
            return Err(WheatRustError::ReferenceBank(format!(
                "model produces {} features but the reference bank holds {}-wide vectors",
                probe.len(),
                self.index.dimension()
            )));
        }
        Ok(())
    }

    /// Validation steps in order; the first failing step decides the rejection
    pub fn validate(&self, request: &DiagnosisRequest) -> std::result::Result<RgbImage, Rejection> {
        let file = request.file.as_ref().ok_or(Rejection::MissingFile)?;

        if file.filename.is_empty() {
            return Err(Rejection::EmptyFilename);
        }

        if !has_allowed_extension(&file.filename, &self.allowed_extensions) {
            return Err(Rejection::DisallowedExtension {
                filename: file.filename.clone(),
            });
        }

        let image = decode_rgb(&file.bytes).map_err(|e| {
            debug!("Could not decode {}: {}", file.filename, e);
            Rejection::UndecodableImage
        })?;

        let decision = gate::evaluate(&image, &self.segmentation.leaf_range, self.min_leaf_fraction);
        if !decision.accepted {
            return Err(Rejection::NotWheat { leaf_fraction: decision.leaf_fraction });
        }

        Ok(image)
    }

    /// Validate and analyze one request
    pub fn diagnose(&self, request: &DiagnosisRequest) -> Result<Outcome> {
        let image_id = request.image_id().to_string();

        let image = match self.validate(request) {
            Ok(image) => image,
            Err(rejection) => {
                warn!("Rejected image {}: {} ({})", image_id, rejection.reason(), rejection);
                return Ok(Outcome::Rejected { image_id, rejection });
            }
        };

        info!("Image {} passed validation, extracting features...", image_id);
        self.analyze(image_id, &image).map(Outcome::Diagnosed)
    }

    /// Classify, segment and render an already validated image
    pub fn analyze(&self, image_id: String, image: &RgbImage) -> Result<DiagnosisResult> {
        let (label, segmentation) = if self.use_parallel {
            let (label, segmentation) = rayon::join(
                || self.classify(image),
                || segment(image, &self.segmentation),
            );
            (label?, segmentation?)
        } else {
            (self.classify(image)?, segment(image, &self.segmentation)?)
        };

        info!(
            "Image {}: class {}, {}% infected",
            image_id, label, segmentation.infected_percentage
        );

        self.assemble(image_id, image, label, segmentation)
    }

    /// Severity label of the nearest reference vector
    pub fn classify(&self, image: &RgbImage) -> Result<SeverityLabel> {
        let features = self.extractor.extract(image)?;
        self.index.classify(&features)
    }

    fn assemble(
        &self,
        image_id: String,
        image: &RgbImage,
        label: SeverityLabel,
        segmentation: Segmentation,
    ) -> Result<DiagnosisResult> {
        let mask_visualization =
            render_mask_visualization(&segmentation.leaf_mask, &segmentation.infected_mask);
        let highlight =
            render_infection_highlight(image, &segmentation.infected_mask, self.blur_kernel_size);

        Ok(DiagnosisResult {
            image_id,
            predicted_class: label,
            infected_percentage: segmentation.infected_percentage,
            infected_pixels: segmentation.infected_pixels,
            green_pixels: segmentation.healthy_pixels,
            result: format!("{}{}", segmentation.infected_percentage, label),
            green_mask: encode_gray_base64(&mask_visualization)?,
            infected_highlight: encode_rgb_base64(&highlight)?,
            mask_visualization,
            highlight,
        })
    }
}

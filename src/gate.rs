// src/gate.rs - Coarse check that an upload depicts a leaf at all

use image::RgbImage;
use log::debug;

use crate::color::HsvRange;
use crate::morphology::count_nonzero;
use crate::segmentation::leaf_mask;

/// Fraction of image pixels that fall inside the leaf HSV band
pub fn leaf_fraction(image: &RgbImage, leaf_range: &HsvRange) -> f64 {
    let (width, height) = image.dimensions();
    let total = width as u64 * height as u64;
    if total == 0 {
        return 0.0;
    }
    count_nonzero(&leaf_mask(image, leaf_range)) as f64 / total as f64
}

/// Result of the wheat-likelihood check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    pub leaf_fraction: f64,
    pub accepted: bool,
}

/// Accept iff the leaf fraction exceeds `min_fraction`.
///
/// This runs before model inference so that obviously unrelated uploads are
/// rejected cheaply. It is a heuristic, not a classifier.
pub fn evaluate(image: &RgbImage, leaf_range: &HsvRange, min_fraction: f64) -> GateDecision {
    let fraction = leaf_fraction(image, leaf_range);
    debug!("Leaf detection: {:.1}% of image looks like leaf", fraction * 100.0);
    GateDecision {
        leaf_fraction: fraction,
        accepted: fraction > min_fraction,
    }
}

pub fn is_likely_wheat(image: &RgbImage, leaf_range: &HsvRange, min_fraction: f64) -> bool {
    evaluate(image, leaf_range, min_fraction).accepted
}

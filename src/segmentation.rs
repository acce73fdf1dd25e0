// src/segmentation.rs - Leaf and infection masks from HSV thresholds

use image::{GrayImage, RgbImage};
use log::debug;

use crate::color::{in_range, rgb_to_hsv, value_channel, with_value_channel, HsvRange};
use crate::config::Config;
use crate::contrast::apply_clahe;
use crate::errors::Result;
use crate::morphology::{apply_opening, count_nonzero, mask_and, mask_or};

/// Threshold set and cleanup parameters used to segment a leaf image
#[derive(Debug, Clone)]
pub struct SegmentationParams {
    pub leaf_range: HsvRange,
    pub yellow_range: HsvRange,
    pub brown_range: HsvRange,
    pub clahe_clip_limit: f64,
    pub clahe_tile_grid: u32,
    pub opening_kernel_size: u32,
}

impl From<&Config> for SegmentationParams {
    fn from(config: &Config) -> Self {
        Self {
            leaf_range: config.leaf_range,
            yellow_range: config.yellow_range,
            brown_range: config.brown_range,
            clahe_clip_limit: config.clahe_clip_limit,
            clahe_tile_grid: config.clahe_tile_grid,
            opening_kernel_size: config.opening_kernel_size,
        }
    }
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Masks and pixel statistics for one image
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub leaf_mask: GrayImage,
    pub infected_mask: GrayImage,
    /// Infected share of the leaf area, 0..=100
    pub infected_percentage: u8,
    pub infected_pixels: u64,
    /// Leaf pixels that are not infected
    pub healthy_pixels: u64,
}

impl Segmentation {
    pub fn leaf_pixels(&self) -> u64 {
        self.infected_pixels + self.healthy_pixels
    }
}

/// Leaf mask straight from the HSV thresholds, without contrast normalization
pub fn leaf_mask(image: &RgbImage, leaf_range: &HsvRange) -> GrayImage {
    in_range(&rgb_to_hsv(image), leaf_range)
}

/// Infected percentage rounded half to even; zero leaf area yields 0
pub fn infected_percentage(infected_pixels: u64, leaf_pixels: u64) -> u8 {
    if leaf_pixels == 0 {
        return 0;
    }
    let percent = (infected_pixels as f64 / leaf_pixels as f64) * 100.0;
    percent.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Segment an RGB image into leaf and infection masks.
///
/// The value channel is equalized with CLAHE before thresholding. Infection
/// is the union of the yellow and brown bands restricted to the leaf mask,
/// then cleaned with a morphological opening. Opening can only remove pixels,
/// so the infected mask always stays a subset of the leaf mask.
pub fn segment(image: &RgbImage, params: &SegmentationParams) -> Result<Segmentation> {
    let hsv = rgb_to_hsv(image);
    let equalized = apply_clahe(&value_channel(&hsv), params.clahe_clip_limit, params.clahe_tile_grid)?;
    let hsv = with_value_channel(&hsv, &equalized);

    let leaf_mask = in_range(&hsv, &params.leaf_range);

    let yellow = in_range(&hsv, &params.yellow_range);
    let brown = in_range(&hsv, &params.brown_range);
    let rust = mask_and(&mask_or(&yellow, &brown), &leaf_mask);
    let infected_mask = apply_opening(&rust, params.opening_kernel_size)?;

    let leaf_pixels = count_nonzero(&leaf_mask);
    let infected_pixels = count_nonzero(&infected_mask);
    let healthy_pixels = leaf_pixels - infected_pixels;
    let infected_percentage = infected_percentage(infected_pixels, leaf_pixels);

    debug!(
        "Segmentation: {} leaf pixels, {} infected, {} healthy ({}%)",
        leaf_pixels, infected_pixels, healthy_pixels, infected_percentage
    );

    Ok(Segmentation {
        leaf_mask,
        infected_mask,
        infected_percentage,
        infected_pixels,
        healthy_pixels,
    })
}

// src/color.rs - RGB to HSV conversion and HSV band thresholding

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// HSV image in the 8-bit convention: H in 0..180, S and V in 0..=255
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Value written into a mask for member pixels
pub const MASK_ON: u8 = 255;

/// Inclusive HSV bounds, `lower` and `upper` as `[h, s, v]`
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: &Rgb<u8>) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    /// True when every channel has `lower <= upper` and hue stays below 180
    pub fn is_valid(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c]) && self.upper[0] < 180
    }
}

/// Convert one RGB pixel to 8-bit HSV.
///
/// Hue is computed in degrees and halved so that it fits a byte, saturation is
/// `255 * (max - min) / max` and value is the channel maximum.
#[inline]
pub fn rgb_pixel_to_hsv(pixel: &Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = pixel.0;
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (v - min) as f32;

    let s = if v == 0 {
        0.0
    } else {
        255.0 * delta / v as f32
    };

    let h = if delta == 0.0 {
        0.0
    } else {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let degrees = if v as f32 == r {
            60.0 * (g - b) / delta
        } else if v as f32 == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        if degrees < 0.0 { degrees + 360.0 } else { degrees }
    };

    // 360 degrees wraps to 0 after halving and rounding
    let h = ((h / 2.0).round() as u32 % 180) as u8;
    Rgb([h, s.round().min(255.0) as u8, v])
}

/// Convert an RGB image to HSV
pub fn rgb_to_hsv(image: &RgbImage) -> HsvImage {
    let (width, height) = image.dimensions();
    let mut hsv = HsvImage::new(width, height);
    for (src, dst) in image.pixels().zip(hsv.pixels_mut()) {
        *dst = rgb_pixel_to_hsv(src);
    }
    hsv
}

/// Threshold an HSV image into a binary mask (`MASK_ON` inside the range, 0 outside)
pub fn in_range(hsv: &HsvImage, range: &HsvRange) -> GrayImage {
    let (width, height) = hsv.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if range.contains(src) {
            *dst = Luma([MASK_ON]);
        }
    }
    mask
}

/// Split out the value channel of an HSV image
pub fn value_channel(hsv: &HsvImage) -> GrayImage {
    let (width, height) = hsv.dimensions();
    GrayImage::from_fn(width, height, |x, y| Luma([hsv.get_pixel(x, y)[2]]))
}

/// Replace the value channel of an HSV image
pub fn with_value_channel(hsv: &HsvImage, value: &GrayImage) -> HsvImage {
    let mut out = hsv.clone();
    for (dst, v) in out.pixels_mut().zip(value.pixels()) {
        dst[2] = v[0];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors_map_to_halved_hues() {
        assert_eq!(rgb_pixel_to_hsv(&Rgb([255, 0, 0])), Rgb([0, 255, 255]));
        assert_eq!(rgb_pixel_to_hsv(&Rgb([0, 255, 0])), Rgb([60, 255, 255]));
        assert_eq!(rgb_pixel_to_hsv(&Rgb([0, 0, 255])), Rgb([120, 255, 255]));
        assert_eq!(rgb_pixel_to_hsv(&Rgb([255, 255, 0])), Rgb([30, 255, 255]));
    }

    #[test]
    fn greys_have_no_hue_or_saturation() {
        assert_eq!(rgb_pixel_to_hsv(&Rgb([0, 0, 0])), Rgb([0, 0, 0]));
        assert_eq!(rgb_pixel_to_hsv(&Rgb([128, 128, 128])), Rgb([0, 0, 128]));
    }

    #[test]
    fn near_red_magenta_wraps_into_range() {
        let hsv = rgb_pixel_to_hsv(&Rgb([255, 0, 1]));
        assert!(hsv[0] < 180);
    }

    #[test]
    fn in_range_is_inclusive() {
        let range = HsvRange::new([20, 20, 20], [100, 255, 255]);
        assert!(range.contains(&Rgb([20, 20, 20])));
        assert!(range.contains(&Rgb([100, 255, 255])));
        assert!(!range.contains(&Rgb([19, 255, 255])));
        assert!(!range.contains(&Rgb([60, 19, 255])));
    }

    #[test]
    fn inverted_range_is_invalid() {
        assert!(!HsvRange::new([50, 0, 0], [40, 255, 255]).is_valid());
        assert!(!HsvRange::new([0, 0, 0], [180, 255, 255]).is_valid());
        assert!(HsvRange::new([0, 0, 0], [179, 255, 255]).is_valid());
    }
}

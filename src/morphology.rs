use image::{GrayImage, Luma};

use crate::color::MASK_ON;
use crate::errors::{WheatRustError, Result};
use crate::image_utils::{create_elliptical_kernel, in_bounds};

/// Kernel offsets `(dx, dy)` relative to the kernel anchor (its centre)
fn kernel_offsets(kernel: &GrayImage) -> Vec<(i32, i32)> {
    let (k_width, k_height) = kernel.dimensions();
    let k_radius_x = (k_width / 2) as i32;
    let k_radius_y = (k_height / 2) as i32;

    kernel
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(kx, ky, _)| (kx as i32 - k_radius_x, ky as i32 - k_radius_y))
        .collect()
}

/// Binary erosion of a mask.
///
/// A pixel survives only if every in-bounds kernel neighbour is set. Pixels
/// outside the image are ignored, so regions touching the border are not
/// eaten away from that side.
pub fn erode_mask(mask: &GrayImage, kernel: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let offsets = kernel_offsets(kernel);
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] == 0 {
                continue;
            }

            let keep = offsets.iter().all(|&(dx, dy)| {
                let img_x = x as i32 + dx;
                let img_y = y as i32 + dy;
                !in_bounds(img_x, img_y, width, height)
                    || mask.get_pixel(img_x as u32, img_y as u32)[0] > 0
            });

            if keep {
                result.put_pixel(x, y, Luma([MASK_ON]));
            }
        }
    }

    result
}

/// Binary dilation of a mask; out-of-image neighbours never set a pixel
pub fn dilate_mask(mask: &GrayImage, kernel: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let offsets = kernel_offsets(kernel);
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let hit = offsets.iter().any(|&(dx, dy)| {
                // Reflected kernel, identical for the symmetric ellipse
                let img_x = x as i32 - dx;
                let img_y = y as i32 - dy;
                in_bounds(img_x, img_y, width, height)
                    && mask.get_pixel(img_x as u32, img_y as u32)[0] > 0
            });

            if hit {
                result.put_pixel(x, y, Luma([MASK_ON]));
            }
        }
    }

    result
}

/// Apply morphological opening (erosion followed by dilation) with an elliptical kernel
pub fn apply_opening(mask: &GrayImage, kernel_size: u32) -> Result<GrayImage> {
    if kernel_size == 0 {
        return Err(WheatRustError::Morphology(
            "Kernel size must be greater than 0".to_string()
        ));
    }

    let kernel = create_elliptical_kernel(kernel_size);
    let eroded = erode_mask(mask, &kernel);
    Ok(dilate_mask(&eroded, &kernel))
}

/// Pixel-wise AND of two masks of equal size
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |p, q| p > 0 && q > 0)
}

/// Pixel-wise OR of two masks of equal size
pub fn mask_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |p, q| p > 0 || q > 0)
}

fn combine(a: &GrayImage, b: &GrayImage, op: impl Fn(u8, u8) -> bool) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    let mut out = GrayImage::new(width, height);
    for ((p, q), dst) in a.pixels().zip(b.pixels()).zip(out.pixels_mut()) {
        if op(p[0], q[0]) {
            *dst = Luma([MASK_ON]);
        }
    }
    out
}

/// Number of set pixels in a mask
pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] > 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn opening_removes_isolated_pixels() {
        let mut mask = square_mask(20, 5, 5, 8);
        mask.put_pixel(17, 2, Luma([MASK_ON]));
        let opened = apply_opening(&mask, 3).unwrap();
        assert_eq!(opened.get_pixel(17, 2)[0], 0);
    }

    #[test]
    fn opening_keeps_solid_regions() {
        let mask = square_mask(20, 5, 5, 8);
        let opened = apply_opening(&mask, 3).unwrap();
        // A 3x3 cross opening only rounds the four corners of a square
        assert_eq!(count_nonzero(&opened), 64 - 4);
        assert_eq!(opened.get_pixel(8, 8)[0], MASK_ON);
    }

    #[test]
    fn border_regions_are_not_eroded() {
        let mask = GrayImage::from_pixel(10, 10, Luma([MASK_ON]));
        let opened = apply_opening(&mask, 3).unwrap();
        assert_eq!(count_nonzero(&opened), 100);
    }

    #[test]
    fn zero_kernel_is_an_error() {
        let mask = GrayImage::new(4, 4);
        assert!(apply_opening(&mask, 0).is_err());
    }

    #[test]
    fn and_or_compose() {
        let a = square_mask(10, 0, 0, 5);
        let b = square_mask(10, 3, 3, 5);
        assert_eq!(count_nonzero(&mask_and(&a, &b)), 4);
        assert_eq!(count_nonzero(&mask_or(&a, &b)), 25 + 25 - 4);
    }
}

// src/render.rs - Display artifacts derived from the segmentation masks

use image::{GrayImage, Luma, RgbImage};

use crate::image_utils::gaussian_blur;

/// Mask visualization tones
pub const BACKGROUND_TONE: u8 = 127;
pub const HEALTHY_TONE: u8 = 255;
pub const INFECTED_TONE: u8 = 0;

/// Tri-tone mask: grey background, white healthy leaf, black infection
pub fn render_mask_visualization(leaf_mask: &GrayImage, infected_mask: &GrayImage) -> GrayImage {
    let (width, height) = leaf_mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if infected_mask.get_pixel(x, y)[0] > 0 {
            Luma([INFECTED_TONE])
        } else if leaf_mask.get_pixel(x, y)[0] > 0 {
            Luma([HEALTHY_TONE])
        } else {
            Luma([BACKGROUND_TONE])
        }
    })
}

/// Keep infected pixels sharp and blur everything else.
///
/// `blur_kernel_size` is the odd width of the normalized Gaussian window;
/// sigma is derived from it.
pub fn render_infection_highlight(
    image: &RgbImage,
    infected_mask: &GrayImage,
    blur_kernel_size: u32,
) -> RgbImage {
    let blurred = gaussian_blur(image, blur_kernel_size);
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        if infected_mask.get_pixel(x, y)[0] > 0 {
            *image.get_pixel(x, y)
        } else {
            *blurred.get_pixel(x, y)
        }
    })
}

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::filter::separable_filter_equal;

/// Fixed-point precision of the bilinear resize weights
const RESIZE_COEF_BITS: u32 = 11;
const RESIZE_COEF_SCALE: f32 = (1 << RESIZE_COEF_BITS) as f32;

/// Source indices and fixed-point weights for one destination coordinate.
///
/// Destination pixel centres map to `(d + 0.5) * scale - 0.5` in the source;
/// samples that fall outside the outermost source centres take the edge pixel.
fn linear_taps(dst: u32, scale: f64, src_len: u32) -> (u32, u32, i64, i64) {
    let f = ((dst as f64 + 0.5) * scale - 0.5) as f32;
    let mut s = f.floor() as i64;
    let mut frac = f - s as f32;

    if s < 0 {
        s = 0;
        frac = 0.0;
    }
    if s >= src_len as i64 - 1 {
        s = src_len as i64 - 1;
        frac = 0.0;
    }

    let s0 = s as u32;
    let s1 = (s0 + 1).min(src_len - 1);
    let w0 = ((1.0 - frac) * RESIZE_COEF_SCALE).round_ties_even() as i64;
    let w1 = (frac * RESIZE_COEF_SCALE).round_ties_even() as i64;
    (s0, s1, w0, w1)
}

/// Resize an image to the specified dimensions.
///
/// Point-sampled bilinear interpolation with half-pixel centres and 11-bit
/// fixed-point weights, so downscaling samples rather than averages.
pub fn resize_image(
    image: &RgbImage,
    dimensions: [u32; 2],
) -> RgbImage {
    let (width, height) = (dimensions[0], dimensions[1]);
    let (src_w, src_h) = image.dimensions();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return RgbImage::new(width, height);
    }

    let scale_x = src_w as f64 / width as f64;
    let scale_y = src_h as f64 / height as f64;
    let x_taps: Vec<_> = (0..width).map(|x| linear_taps(x, scale_x, src_w)).collect();
    let shift = 2 * RESIZE_COEF_BITS;
    let delta = 1i64 << (shift - 1);

    let mut output = RgbImage::new(width, height);
    for y in 0..height {
        let (y0, y1, wy0, wy1) = linear_taps(y, scale_y, src_h);
        for (x, &(x0, x1, wx0, wx1)) in x_taps.iter().enumerate() {
            let row = |sy: u32, c: usize| {
                image.get_pixel(x0, sy)[c] as i64 * wx0 + image.get_pixel(x1, sy)[c] as i64 * wx1
            };
            let mut pixel = [0u8; 3];
            for (c, value) in pixel.iter_mut().enumerate() {
                let acc = wy0 * row(y0, c) + wy1 * row(y1, c);
                *value = ((acc + delta) >> shift).clamp(0, 255) as u8;
            }
            output.put_pixel(x as u32, y, Rgb(pixel));
        }
    }

    output
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample (`dcb|abcd|cba`)
pub fn reflect_101(index: i64, len: u32) -> u32 {
    let n = len as i64;
    if n <= 1 {
        return 0;
    }
    let mut p = index;
    while p < 0 || p >= n {
        p = if p < 0 { -p } else { 2 * n - 2 - p };
    }
    p as u32
}

/// Create an elliptical structuring element of `size x size` pixels.
///
/// Each row spans `center ± round(c * sqrt(1 - dy²/r²))`, which makes a 3x3
/// kernel a cross and larger kernels a filled disc. Member pixels are 255.
pub fn create_elliptical_kernel(size: u32) -> GrayImage {
    if size == 0 {
        return GrayImage::new(0, 0);
    }

    let mut kernel = GrayImage::new(size, size);
    let r = (size / 2) as f64;
    let c = (size / 2) as f64;

    if r == 0.0 {
        // 1x1 and the degenerate row-only case
        for x in 0..size {
            kernel.put_pixel(x, 0, Luma([255]));
        }
        return kernel;
    }

    let inv_r2 = 1.0 / (r * r);
    for y in 0..size {
        let dy = y as f64 - r;
        if dy.abs() > r {
            continue;
        }
        let dx = (c * ((r * r - dy * dy) * inv_r2).sqrt()).round() as i64;
        let x1 = (c as i64 - dx).max(0) as u32;
        let x2 = (c as i64 + dx + 1).min(size as i64) as u32;
        for x in x1..x2 {
            kernel.put_pixel(x, y, Luma([255]));
        }
    }

    kernel
}

/// Gaussian sigma implied by an odd kernel size when no sigma is given
#[inline]
pub fn sigma_for_kernel_size(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian with `size` taps; the weights sum to one
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let center = (size as f32 - 1.0) * 0.5;
    let scale = -0.5 / (sigma as f64 * sigma as f64);
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center as f64;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Gaussian blur over a `kernel_size x kernel_size` window.
///
/// Borders are mirrored without repeating the edge pixel and the filter runs
/// in floating point, so flat regions come out unchanged.
pub fn gaussian_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || kernel_size == 0 {
        return image.clone();
    }

    let kernel = gaussian_kernel(kernel_size, sigma_for_kernel_size(kernel_size));
    let pad = kernel_size / 2;

    let padded: ImageBuffer<Rgb<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
            let sx = reflect_101(x as i64 - pad as i64, width);
            let sy = reflect_101(y as i64 - pad as i64, height);
            let p = image.get_pixel(sx, sy);
            Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
        });
    let blurred = separable_filter_equal(&padded, &kernel);

    RgbImage::from_fn(width, height, |x, y| {
        let p = blurred.get_pixel(x + pad, y + pad);
        Rgb(p.0.map(|v| v.round_ties_even().clamp(0.0, 255.0) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn on_pixels(kernel: &GrayImage) -> Vec<(u32, u32)> {
        kernel
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    fn gray_row(values: &[u8]) -> RgbImage {
        RgbImage::from_fn(values.len() as u32, 1, |x, _| {
            let v = values[x as usize];
            Rgb([v, v, v])
        })
    }

    fn red_channel(image: &RgbImage) -> Vec<u8> {
        image.pixels().map(|p| p[0]).collect()
    }

    #[test]
    fn three_by_three_ellipse_is_a_cross() {
        let kernel = create_elliptical_kernel(3);
        assert_eq!(
            on_pixels(&kernel),
            vec![(1, 0), (0, 1), (1, 1), (2, 1), (1, 2)]
        );
    }

    #[test]
    fn five_by_five_ellipse_drops_corners() {
        let kernel = create_elliptical_kernel(5);
        assert_eq!(kernel.get_pixel(0, 0)[0], 0);
        assert_eq!(kernel.get_pixel(4, 4)[0], 0);
        assert_eq!(kernel.get_pixel(2, 2)[0], 255);
        assert_eq!(kernel.get_pixel(0, 2)[0], 255);
    }

    #[test]
    fn single_pixel_kernel() {
        let kernel = create_elliptical_kernel(1);
        assert_eq!(on_pixels(&kernel), vec![(0, 0)]);
    }

    #[test]
    fn sigma_for_25_pixel_blur() {
        assert!((sigma_for_kernel_size(25) - 4.1).abs() < 1e-5);
    }

    #[test]
    fn bounds_check() {
        assert!(in_bounds(0, 0, 2, 2));
        assert!(!in_bounds(-1, 0, 2, 2));
        assert!(!in_bounds(0, 2, 2, 2));
    }

    #[test]
    fn reflection_skips_the_edge_sample() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        // Short rows reflect repeatedly
        assert_eq!(reflect_101(5, 3), 1);
        assert_eq!(reflect_101(7, 1), 0);
    }

    #[test]
    fn upscale_interpolates_between_centres() {
        let out = resize_image(&gray_row(&[0, 100]), [4, 1]);
        assert_eq!(red_channel(&out), vec![0, 25, 75, 100]);
    }

    #[test]
    fn downscale_samples_instead_of_averaging() {
        // A 3x reduction lands exactly on source pixels 1 and 4
        let out = resize_image(&gray_row(&[0, 30, 60, 90, 120, 150]), [2, 1]);
        assert_eq!(red_channel(&out), vec![30, 120]);

        // A 2x reduction lands between pixel pairs
        let out = resize_image(&gray_row(&[0, 40, 80, 120]), [2, 1]);
        assert_eq!(red_channel(&out), vec![20, 100]);
    }

    #[test]
    fn two_dimensional_downscale() {
        let image = RgbImage::from_fn(4, 4, |x, y| {
            let v = (10 * x + 40 * y) as u8;
            Rgb([v, v, v])
        });
        let out = resize_image(&image, [2, 2]);
        assert_eq!(red_channel(&out), vec![25, 45, 105, 125]);
    }

    #[test]
    fn resize_keeps_flat_colour() {
        let image = RgbImage::from_pixel(300, 180, Rgb([10, 200, 30]));
        let out = resize_image(&image, [224, 224]);
        assert!(out.pixels().all(|p| *p == Rgb([10, 200, 30])));
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel(25, sigma_for_kernel_size(25));
        assert_eq!(kernel.len(), 25);
        assert_approx_eq!(kernel.iter().sum::<f32>(), 1.0f32, 1e-5);
        assert_approx_eq!(kernel[0], kernel[24]);
        assert!(kernel[12] > kernel[11]);
    }

    #[test]
    fn blur_keeps_flat_images_unchanged() {
        for size in [1, 8, 20, 30, 64] {
            let image = RgbImage::from_pixel(size, size, Rgb([10, 200, 30]));
            let out = gaussian_blur(&image, 25);
            assert!(out.pixels().all(|p| *p == Rgb([10, 200, 30])), "size {}", size);
        }
    }

    #[test]
    fn blur_smooths_a_step() {
        let image = RgbImage::from_fn(40, 4, |x, _| if x < 20 { Rgb([0, 0, 0]) } else { Rgb([200, 200, 200]) });
        let out = gaussian_blur(&image, 25);
        let row: Vec<u8> = (0..40).map(|x| out.get_pixel(x, 2)[0]).collect();
        assert!(row.windows(2).all(|w| w[0] <= w[1]));
        assert!(row[19] > 0 && row[20] < 200);
        assert_eq!(row[0], 0);
        assert_eq!(row[39], 200);
    }
}

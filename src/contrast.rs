// src/contrast.rs - Contrast limited adaptive histogram equalization (CLAHE)

use image::{GrayImage, Luma};

use crate::errors::{WheatRustError, Result};
use crate::image_utils::reflect_101;

const BINS: usize = 256;

/// Equalize a single-channel image tile by tile.
///
/// The image is split into a `grid x grid` layout of equal tiles, padding the
/// right and bottom edges by reflection when the size is not a multiple of
/// the grid. Each tile gets a clipped histogram whose excess is redistributed
/// over all bins, and the resulting lookup tables are blended bilinearly
/// between neighbouring tile centres so that no seams appear at tile borders.
pub fn apply_clahe(image: &GrayImage, clip_limit: f64, grid: u32) -> Result<GrayImage> {
    if grid == 0 {
        return Err(WheatRustError::Config("CLAHE tile grid must be > 0".to_string()));
    }
    if clip_limit <= 0.0 {
        return Err(WheatRustError::Config("CLAHE clip limit must be > 0.0".to_string()));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let pad_w = (grid - width % grid) % grid;
    let pad_h = (grid - height % grid) % grid;
    let tile_w = (width + pad_w) / grid;
    let tile_h = (height + pad_h) / grid;

    // One lookup table per tile, row-major
    let mut luts: Vec<[u8; BINS]> = Vec::with_capacity((grid * grid) as usize);
    for ty in 0..grid {
        for tx in 0..grid {
            luts.push(tile_lut(image, (tx * tile_w, ty * tile_h), (tile_w, tile_h), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * grid + tx) as usize];

    // Tile centre index and blend weight along one axis
    let axis = |pos: u32, tile: u32| {
        let f = pos as f32 * (1.0 / tile as f32) - 0.5;
        let t1 = f.floor();
        let weight = f - t1;
        let t2 = (t1 as i64 + 1).min(grid as i64 - 1) as u32;
        ((t1 as i64).max(0) as u32, t2, weight)
    };
    let columns: Vec<_> = (0..width).map(|x| axis(x, tile_w)).collect();

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = axis(y, tile_h);

        for (x, &(tx1, tx2, xa)) in columns.iter().enumerate() {
            let v = image.get_pixel(x as u32, y)[0] as usize;
            let top = lut_at(tx1, ty1)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty1)[v] as f32 * xa;
            let bottom = lut_at(tx1, ty2)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty2)[v] as f32 * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            output.put_pixel(x as u32, y, Luma([value.round_ties_even().clamp(0.0, 255.0) as u8]));
        }
    }

    Ok(output)
}

/// Build the clipped and equalized lookup table for one tile.
///
/// Tiles reaching past the image read reflected pixels.
fn tile_lut(image: &GrayImage, origin: (u32, u32), size: (u32, u32), clip_limit: f64) -> [u8; BINS] {
    let (width, height) = image.dimensions();
    let (x0, y0) = origin;
    let (tile_w, tile_h) = size;
    let area = (tile_w * tile_h) as usize;

    let mut hist = [0usize; BINS];
    for y in y0..y0 + tile_h {
        let sy = reflect_101(y as i64, height);
        for x in x0..x0 + tile_w {
            let sx = reflect_101(x as i64, width);
            hist[image.get_pixel(sx, sy)[0] as usize] += 1;
        }
    }

    let clip = ((clip_limit * area as f64 / BINS as f64) as usize).max(1);
    let mut excess = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS;
    let residual = excess - batch * BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut remaining = residual;
        let mut bin = 0;
        while bin < BINS && remaining > 0 {
            hist[bin] += 1;
            remaining -= 1;
            bin += step;
        }
    }

    let scale = (BINS - 1) as f32 / area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0usize;
    for (i, count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).round_ties_even().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturated_image_stays_saturated() {
        let image = GrayImage::from_pixel(64, 48, Luma([255]));
        let out = apply_clahe(&image, 2.0, 8).unwrap();
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn dark_image_stays_dark() {
        let image = GrayImage::from_pixel(64, 64, Luma([0]));
        let out = apply_clahe(&image, 2.0, 8).unwrap();
        assert!(out.pixels().all(|p| p[0] < 20));
    }

    #[test]
    fn single_tile_mapping_preserves_order() {
        let image = GrayImage::from_fn(64, 8, |x, _| Luma([(x * 4) as u8]));
        let out = apply_clahe(&image, 2.0, 1).unwrap();
        for x in 1..64 {
            assert!(out.get_pixel(x, 0)[0] >= out.get_pixel(x - 1, 0)[0]);
        }
    }

    #[test]
    fn image_smaller_than_grid_is_handled() {
        let image = GrayImage::from_pixel(3, 5, Luma([77]));
        let out = apply_clahe(&image, 2.0, 8).unwrap();
        assert_eq!(out.dimensions(), (3, 5));
    }

    #[test]
    fn uneven_sizes_keep_the_full_grid() {
        // 100 is not a multiple of 8, so the last tile column reads mirrored pixels
        let image = GrayImage::from_fn(100, 36, |x, y| Luma([((x * 2 + y) % 256) as u8]));
        let out = apply_clahe(&image, 2.0, 8).unwrap();
        assert_eq!(out.dimensions(), (100, 36));

        let flat = GrayImage::from_pixel(100, 36, Luma([255]));
        let out = apply_clahe(&flat, 2.0, 8).unwrap();
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn first_row_uses_the_first_tile_only() {
        // Left half dark, right half bright: pixel (0, 0) sits before the
        // first tile centre and must map through tile (0, 0) alone
        let image = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 50 } else { 200 }]));
        let single = apply_clahe(&GrayImage::from_pixel(8, 8, Luma([50])), 2.0, 1).unwrap();
        let out = apply_clahe(&image, 2.0, 2).unwrap();
        assert_eq!(out.get_pixel(0, 0)[0], single.get_pixel(0, 0)[0]);
    }

    #[test]
    fn zero_grid_is_rejected() {
        let image = GrayImage::new(4, 4);
        assert!(apply_clahe(&image, 2.0, 0).is_err());
    }
}

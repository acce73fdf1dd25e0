use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::errors::{WheatRustError, Result};

/// Raw upload read from disk, before any validation
pub struct InputFile {
    pub bytes: Vec<u8>,
    /// File name including extension
    pub filename: String,
}

/// Get all files with one of `extensions` from a directory (recursively)
pub fn get_image_files_in_dir<P: AsRef<Path>>(
    dir_path: P,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(WheatRustError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(WheatRustError::Config(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let mut files = Vec::new();
    find_image_files_recursive(dir_path, extensions, &mut files)?;
    files.sort();

    Ok(files)
}

fn find_image_files_recursive(
    dir_path: &Path,
    extensions: &[String],
    result: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_image_files_recursive(&path, extensions, result)?;
        } else if path.is_file() {
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if matches {
                result.push(path);
            }
        }
    }

    Ok(())
}

/// Read a file into memory without decoding it
pub fn read_input_file<P: AsRef<Path>>(path: P) -> Result<InputFile> {
    let path = path.as_ref();

    let filename = path.file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| WheatRustError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let bytes = fs::read(path)?;

    Ok(InputFile { bytes, filename })
}

/// Decode encoded image bytes (PNG, JPEG, ...) into an RGB image
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// PNG-encode a single-channel image and wrap it in base64
pub fn encode_gray_base64(image: &GrayImage) -> Result<String> {
    let png = encode_png(&DynamicImage::ImageLuma8(image.clone()))?;
    Ok(STANDARD.encode(png))
}

/// PNG-encode an RGB image and wrap it in base64
pub fn encode_rgb_base64(image: &RgbImage) -> Result<String> {
    let png = encode_png(&DynamicImage::ImageRgb8(image.clone()))?;
    Ok(STANDARD.encode(png))
}

/// Inverse of the base64 encoders
pub fn decode_base64_png(encoded: &str) -> Result<DynamicImage> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(image::load_from_memory_with_format(&bytes, ImageFormat::Png)?)
}

/// Save an image as PNG to the specified path
pub fn save_png<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn gray_base64_round_trip_is_lossless() {
        let image = GrayImage::from_fn(17, 9, |x, y| Luma([[0u8, 127, 255][((x + y) % 3) as usize]]));
        let encoded = encode_gray_base64(&image).unwrap();
        let decoded = decode_base64_png(&encoded).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!(decoded.to_luma8(), image);
    }

    #[test]
    fn rgb_base64_round_trip_is_lossless() {
        let image = RgbImage::from_fn(13, 11, |x, y| Rgb([(x * 19) as u8, (y * 23) as u8, (x * y) as u8]));
        let encoded = encode_rgb_base64(&image).unwrap();
        let decoded = decode_base64_png(&encoded).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.to_rgb8(), image);
    }

    #[test]
    fn input_file_keeps_name_and_raw_bytes() {
        let dir = std::env::temp_dir().join(format!("wheat_rust_input_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Leaf.JPG");
        fs::write(&path, b"raw").unwrap();

        let input = read_input_file(&path).unwrap();
        assert_eq!(input.filename, "Leaf.JPG");
        assert_eq!(input.bytes, b"raw".to_vec());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(decode_rgb(b"definitely not an image").is_err());
        assert!(matches!(decode_base64_png("@@@"), Err(WheatRustError::Base64(_))));
    }
}

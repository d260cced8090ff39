//! Raster buffer helpers
//!
//! The pipeline works on owned 8-bit RGB buffers. Decoding and encoding are
//! delegated to the `image` crate; everything else in the crate only sees
//! [`RasterBuffer`] values.

use image::{GrayImage, ImageReader, Limits, Luma, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tiling::Rectangle;

/// Owned RGB8 pixel buffer
pub type RasterBuffer = RgbImage;

/// Image load/save errors
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Failed to decode {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    Save { path: PathBuf, message: String },
}

/// Decode an image file into an RGB8 buffer
///
/// Decoder allocation limits are lifted; scans routinely exceed the
/// `image` crate's 512 MiB default.
pub fn load_image(path: &Path) -> Result<RasterBuffer, RasterError> {
    load_image_with_limits(path, Limits::no_limits())
}

/// Decode an image file under explicit decoder limits
pub fn load_image_with_limits(path: &Path, limits: Limits) -> Result<RasterBuffer, RasterError> {
    if !path.exists() {
        return Err(RasterError::ImageNotFound(path.to_path_buf()));
    }

    let load_error = |message: String| RasterError::Load {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| load_error(e.to_string()))?;
    reader.limits(limits);
    let img = reader.decode().map_err(|e| load_error(e.to_string()))?;

    Ok(img.to_rgb8())
}

/// Encode a buffer; the format follows the file extension
pub fn save_image(path: &Path, buffer: &RasterBuffer) -> Result<(), RasterError> {
    buffer.save(path).map_err(|e| RasterError::Save {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Copy a region out of `source` into a new buffer
///
/// The rectangle must lie within `source`.
pub fn crop_owned(source: &RasterBuffer, rect: Rectangle) -> RasterBuffer {
    image::imageops::crop_imm(source, rect.x1, rect.y1, rect.width(), rect.height()).to_image()
}

/// BT.601 luminance
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

/// Convert an RGB buffer to single-channel luminance
pub fn to_luminance(buffer: &RasterBuffer) -> GrayImage {
    let (width, height) = buffer.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (x, y, pixel) in buffer.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luminance(pixel.0[0], pixel.0[1], pixel.0[2])]));
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_luminance() {
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 150);
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn test_crop_owned_is_independent_copy() {
        let mut source = RgbImage::from_pixel(20, 10, Rgb([10, 20, 30]));
        source.put_pixel(5, 5, Rgb([200, 0, 0]));

        let rect = Rectangle::new(4, 4, 8, 8).unwrap();
        let mut tile = crop_owned(&source, rect);
        assert_eq!(tile.dimensions(), (4, 4));
        assert_eq!(tile.get_pixel(1, 1), &Rgb([200, 0, 0]));

        tile.put_pixel(1, 1, Rgb([0, 0, 0]));
        assert_eq!(source.get_pixel(5, 5), &Rgb([200, 0, 0]));
    }

    #[test]
    fn test_to_luminance_dimensions() {
        let buffer = RgbImage::from_pixel(7, 3, Rgb([128, 128, 128]));
        let gray = to_luminance(&buffer);
        assert_eq!(gray.dimensions(), (7, 3));
        assert_eq!(gray.get_pixel(6, 2).0[0], 128);
    }

    #[test]
    fn test_load_missing_image() {
        let result = load_image(Path::new("/nonexistent/source.png"));
        assert!(matches!(result, Err(RasterError::ImageNotFound(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let buffer = RgbImage::from_pixel(16, 8, Rgb([1, 2, 3]));

        save_image(&path, &buffer).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded, buffer);
    }

    #[test]
    fn test_decoder_limits_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(256, 256, Rgb([9, 9, 9])).save(&path).unwrap();

        let mut tight = Limits::default();
        tight.max_alloc = Some(1024);
        let err = load_image_with_limits(&path, tight).unwrap_err();
        assert!(matches!(err, RasterError::Load { .. }));

        let mut narrow = Limits::default();
        narrow.max_image_width = Some(128);
        assert!(load_image_with_limits(&path, narrow).is_err());

        // The default loader runs without limits
        assert_eq!(load_image(&path).unwrap().dimensions(), (256, 256));
    }

    #[test]
    fn test_load_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("scan.png");
        let renamed = dir.path().join("scan.dat");
        RgbImage::from_pixel(8, 4, Rgb([1, 2, 3])).save(&png).unwrap();
        std::fs::rename(&png, &renamed).unwrap();

        assert_eq!(load_image(&renamed).unwrap().dimensions(), (8, 4));
    }

    #[test]
    fn test_save_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.unknownext");
        let buffer = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        assert!(matches!(
            save_image(&path, &buffer),
            Err(RasterError::Save { .. })
        ));
    }
}

//! Image loading utilities for texture data
//!
//! PNG and JPEG files are decoded with the `image` crate and converted to RGBA8.

use std::path::Path;

use crate::assets::AssetError;

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of color channels (always 4 after conversion)
    pub channels: u8,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {e}", path.display())))?;
        let image = Self::from_rgba(img.to_rgba8());

        log::info!("Loaded image {}x{} from {}", image.width, image.height, path.display());
        Ok(image)
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {e}")))?;
        let image = Self::from_rgba(img.to_rgba8());

        log::debug!("Loaded image {}x{} from memory", image.width, image.height);
        Ok(image)
    }

    fn from_rgba(rgba: image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        Self {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        }
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
            channels: 4,
        }
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.channels, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&img.data[60..64], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_png_bytes_decode_to_rgba() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut encoded = Vec::new();
        image::DynamicImage::ImageRgb8(rgb)
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let img = ImageData::from_bytes(&encoded).unwrap();
        assert_eq!((img.width, img.height, img.channels), (3, 2, 4));
        assert_eq!(img.size_bytes(), 3 * 2 * 4);
        assert_eq!(&img.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(matches!(
            ImageData::from_bytes(b"not an image"),
            Err(AssetError::LoadFailed(_))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(
            ImageData::from_file("data/no_such_texture.jpg"),
            Err(AssetError::NotFound(_))
        ));
    }
}

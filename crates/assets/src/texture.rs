//! Texture loading.
//!
//! Images decode to tightly packed RGBA8 regardless of the source format,
//! which is the only pixel layout the upload path accepts.

use std::path::Path;

use tracing::info;

use crate::error::{AssetError, AssetResult};

/// Decoded texture pixels, tightly packed RGBA8.
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    /// Size of the pixel buffer in bytes (4 bytes per texel).
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Loads and decodes an image file into RGBA8.
///
/// # Errors
///
/// Fails on IO or decode errors, or on a zero-area image.
pub fn load_texture(path: impl AsRef<Path>) -> AssetResult<TextureData> {
    let path = path.as_ref();
    let image = image::open(path)?.into_rgba8();
    let (width, height) = image.dimensions();

    if width == 0 || height == 0 {
        return Err(AssetError::Invalid(format!(
            "{}: zero-area image",
            path.display()
        )));
    }

    info!("Loaded texture {}: {}x{}", path.display(), width, height);

    Ok(TextureData {
        pixels: image.into_raw(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_to_rgba8() {
        let path = std::env::temp_dir().join("ember_test_texture.png");
        let image = image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]));
        image.save(&path).unwrap();

        let texture = load_texture(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(texture.width, 4);
        assert_eq!(texture.height, 2);
        // 3-channel source expands to tightly packed RGBA
        assert_eq!(texture.byte_size(), 4 * 2 * 4);
        assert_eq!(&texture.pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_texture("/nonexistent/texture.png").is_err());
    }
}

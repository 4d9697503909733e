//! Cover image encoding

use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Failed to encode cover: {0}")]
    Encode(String),
}

/// Re-encodes raw frames as JPEG covers.
#[derive(Clone, Copy, Debug)]
pub struct CoverEncoder {
    quality: u8,
}

impl Default for CoverEncoder {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl CoverEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Decode `frame` (any format the `image` crate recognises) and return JPEG bytes.
    pub fn encode_jpeg(&self, frame: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let img = ImageReader::new(Cursor::new(frame))
            .with_guessed_format()
            .map_err(|e| EncodeError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| EncodeError::Decode(e.to_string()))?;

        // JPEG has no alpha channel.
        let rgb = img.to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&rgb)
            .map_err(|e| EncodeError::Encode(e.to_string()))?;

        Ok(out)
    }

    /// [`encode_jpeg`](Self::encode_jpeg) on the blocking pool.
    pub async fn encode(&self, frame: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        let encoder = *self;
        tokio::task::spawn_blocking(move || encoder.encode_jpeg(&frame))
            .await
            .map_err(|e| EncodeError::Encode(format!("Encoder task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    fn png_frame(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn encodes_png_frame_as_jpeg() {
        let jpeg = CoverEncoder::default().encode(png_frame(32, 18)).await.unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 18));
    }

    #[test]
    fn malformed_frame_is_decode_error() {
        let err = CoverEncoder::default()
            .encode_jpeg(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, EncodeError::Decode(_)));
    }

    #[test]
    fn empty_frame_is_decode_error() {
        let err = CoverEncoder::default().encode_jpeg(&[]).unwrap_err();
        assert!(matches!(err, EncodeError::Decode(_)));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(CoverEncoder::new(0).quality, 1);
        assert_eq!(CoverEncoder::new(200).quality, 100);
    }
}

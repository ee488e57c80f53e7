//! RGB24 → JPEG encoding.

use camstream_core::{Frame, SourceError};
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::imageops;
use image::RgbImage;

use crate::domain::config::CameraConfig;

/// Encodes raw RGB24 buffers into JPEG frames, applying the configured flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegEncoder {
    quality: u8,
    flip_horizontal: bool,
    flip_vertical: bool,
}

impl JpegEncoder {
    pub fn new(quality: u8, flip_horizontal: bool, flip_vertical: bool) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            flip_horizontal,
            flip_vertical,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(
            config.jpeg_quality,
            config.flip_horizontal,
            config.flip_vertical,
        )
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encodes a tightly packed `width × height` RGB24 buffer.
    ///
    /// # Errors
    ///
    /// [`SourceError::Encode`] if the buffer is too small for the stated
    /// dimensions or the encoder fails.
    pub fn encode_rgb(&self, width: u32, height: u32, rgb: Vec<u8>) -> Result<Frame, SourceError> {
        let len = rgb.len();
        let mut image = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            SourceError::Encode(format!(
                "{len} byte buffer is too small for a {width}x{height} RGB image"
            ))
        })?;

        if self.flip_horizontal {
            imageops::flip_horizontal_in_place(&mut image);
        }
        if self.flip_vertical {
            imageops::flip_vertical_in_place(&mut image);
        }

        // JPEG typically lands well under a tenth of the raw size.
        let mut out = Vec::with_capacity(len / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&image)
            .map_err(|e| SourceError::Encode(e.to_string()))?;
        Ok(Frame::new(out))
    }
}

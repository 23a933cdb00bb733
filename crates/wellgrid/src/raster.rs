//! Minimal raster access used by the ROI sampler.
//!
//! Sampling only needs dimensions and per-pixel RGB reads, so the decoder
//! is kept behind the [`Raster`] trait. Production code decodes with the
//! `image` crate; tests can supply synthetic buffers.

use image::RgbImage;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while decoding plate image bytes.
#[derive(Debug)]
pub enum DecodeError {
    /// The byte stream is not a decodable raster image.
    Image(image::ImageError),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(err) => write!(f, "failed to decode plate image: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
        }
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

// ── Raster access ──────────────────────────────────────────────────────────

/// Read-only RGB pixel access.
pub trait Raster {
    /// Image width in pixels.
    fn width(&self) -> u32;
    /// Image height in pixels.
    fn height(&self) -> u32;
    /// RGB triple at (x, y). Callers must stay inside the image bounds.
    fn pixel_at(&self, x: u32, y: u32) -> [u8; 3];
}

impl Raster for RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel_at(&self, x: u32, y: u32) -> [u8; 3] {
        self.get_pixel(x, y).0
    }
}

/// Decode encoded image bytes into an RGB raster.
///
/// Any format supported by the enabled `image` decoders is accepted; the
/// result is always converted to 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let dynamic = image::load_from_memory(bytes)?;
    Ok(dynamic.to_rgb8())
}

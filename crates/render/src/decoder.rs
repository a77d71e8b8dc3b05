//! Collaborator interfaces for image sources and region decoders.
//!
//! The engine never decodes pixels itself. A [`RegionDecoder`] turns source
//! rects into [`Bitmap`]s at a power-of-two sample size and an
//! [`ImageSource`] hands out the byte stream it is initialized from.

use image::{ImageBuffer, Rgba};
use std::io::Read;
use std::sync::Arc;
use tessera_viewer_core::{Rect, Size};

/// RGBA8 pixel buffer type used for decoded tiles.
pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Errors produced by a region decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// `decode_region` was called before a successful `init`.
    #[error("decoder is not initialized")]
    NotInitialized,

    /// The decoder was recycled while the request was pending.
    #[error("decoder has been recycled")]
    Recycled,

    #[error("sample size {0} is not a power of two")]
    InvalidSampleSize(u32),

    #[error("region {region:?} lies outside the {bounds} image")]
    RegionOutOfBounds { region: Rect, bounds: Size },

    #[error("image stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),

    /// Cooperative cancellation. Never reported to listeners.
    #[error("decode cancelled")]
    Cancelled,
}

impl DecodeError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DecodeError::Cancelled)
    }
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decoded pixels for one tile.
#[derive(Debug, Clone)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }

    /// True when every pixel has full alpha.
    pub fn is_opaque(&self) -> bool {
        self.image.pixels().all(|pixel| pixel[3] == u8::MAX)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Region decoder used by the decode pool.
///
/// `init` runs once per engine session and reports the full image size.
/// `decode_region` is called concurrently from decode workers and must not
/// block other callers longer than the decode itself. `recycle` releases
/// native resources; the scheduler only calls it once every in-flight decode
/// has been cancelled or joined.
pub trait RegionDecoder: Send + Sync {
    fn init(&self, stream: &mut dyn Read) -> DecodeResult<Size>;

    fn decode_region(&self, region: Rect, sample_size: u32) -> DecodeResult<Bitmap>;

    fn is_ready(&self) -> bool;

    fn recycle(&self);
}

/// Supplies the stream a decoder is initialized from.
pub trait ImageSource: Send + Sync {
    fn provide(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Creates the decoder for a session.
pub trait DecoderProvider: Send + Sync {
    fn provide(&self) -> Arc<dyn RegionDecoder>;
}

impl<F> DecoderProvider for F
where
    F: Fn() -> Arc<dyn RegionDecoder> + Send + Sync,
{
    fn provide(&self) -> Arc<dyn RegionDecoder> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_dimensions_and_size() {
        let bitmap = Bitmap::new(RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255])));

        assert_eq!(bitmap.width(), 4);
        assert_eq!(bitmap.height(), 3);
        assert_eq!(bitmap.byte_size(), 4 * 3 * 4);
        assert!(bitmap.is_opaque());
    }

    #[test]
    fn test_bitmap_transparency_detected() {
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        image.put_pixel(1, 1, Rgba([0, 0, 0, 10]));

        assert!(!Bitmap::new(image).is_opaque());
    }

    #[test]
    fn test_only_cancelled_is_cancellation() {
        assert!(DecodeError::Cancelled.is_cancellation());
        assert!(!DecodeError::NotInitialized.is_cancellation());
        assert!(!DecodeError::Other("boom".into()).is_cancellation());
    }
}

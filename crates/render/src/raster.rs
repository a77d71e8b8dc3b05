//! Region decoder backed by the `image` crate.
//!
//! Decodes the whole file once during `init` and serves regions by cropping
//! and box-filtering the in-memory buffer. Good enough for the CLI and for
//! tests; hosts with very large images plug in a streaming decoder instead.

use crate::decoder::{Bitmap, DecodeError, DecodeResult, RegionDecoder, RgbaImage};
use image::imageops::{self, FilterType};
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};
use tessera_viewer_core::{Rect, Size};
use tracing::debug;

pub struct RasterRegionDecoder {
    image: RwLock<Option<Arc<RgbaImage>>>,
    filter: FilterType,
}

impl RasterRegionDecoder {
    pub fn new() -> Self {
        Self { image: RwLock::new(None), filter: FilterType::Triangle }
    }

    /// Set the filter used when downsampling by the sample size.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn loaded(&self) -> DecodeResult<Arc<RgbaImage>> {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DecodeError::NotInitialized)
    }
}

impl Default for RasterRegionDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionDecoder for RasterRegionDecoder {
    fn init(&self, stream: &mut dyn Read) -> DecodeResult<Size> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;

        let decoded = image::load_from_memory(&bytes)?.into_rgba8();
        let size = Size::new(decoded.width() as i32, decoded.height() as i32);
        debug!(%size, bytes = bytes.len(), "raster decoder initialized");

        *self.image.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(decoded));
        Ok(size)
    }

    fn decode_region(&self, region: Rect, sample_size: u32) -> DecodeResult<Bitmap> {
        if !sample_size.is_power_of_two() {
            return Err(DecodeError::InvalidSampleSize(sample_size));
        }

        let image = self.loaded()?;
        let bounds = Size::new(image.width() as i32, image.height() as i32);
        if region.is_empty()
            || region.left < 0
            || region.top < 0
            || region.right > bounds.width
            || region.bottom > bounds.height
        {
            return Err(DecodeError::RegionOutOfBounds { region, bounds });
        }

        let width = region.width() as u32;
        let height = region.height() as u32;
        let crop = imageops::crop_imm(
            &*image,
            region.left as u32,
            region.top as u32,
            width,
            height,
        )
        .to_image();

        if sample_size == 1 {
            return Ok(Bitmap::new(crop));
        }

        let out_width = width.div_ceil(sample_size).max(1);
        let out_height = height.div_ceil(sample_size).max(1);
        Ok(Bitmap::new(imageops::resize(&crop, out_width, out_height, self.filter)))
    }

    fn is_ready(&self) -> bool {
        self.image.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn recycle(&self) {
        self.image.write().unwrap_or_else(PoisonError::into_inner).take();
    }
}

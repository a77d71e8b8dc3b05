//! Tile model for the tiled image engine.
//!
//! Tiles and their load lifecycle, the multi-resolution pyramid, sample-size
//! selection, and the decoder/source collaborator interfaces.

pub mod decoder;
pub mod pyramid;
pub mod raster;
pub mod source;
pub mod tile;

pub use decoder::{
    Bitmap, DecodeError, DecodeResult, DecoderProvider, ImageSource, RegionDecoder, RgbaImage,
};
pub use pyramid::{
    build_pyramid, PyramidError, SampleSizeCalculator, TilePyramid, DEGENERATE_SAMPLE_SIZE,
};
pub use raster::RasterRegionDecoder;
pub use source::{BytesSource, FileSource};
pub use tile::{Completion, LoadTicket, Tile, TileId, TileState};

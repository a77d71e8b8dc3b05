//! Multi-resolution tile pyramid and sample-size selection.

use crate::tile::{Tile, TileId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_viewer_core::{Rect, Size};
use tracing::{debug, warn};

/// Sample size reported when the requested size collapses to zero.
pub const DEGENERATE_SAMPLE_SIZE: u32 = 32;

/// Levels finer than the base are capped at this multiple of the view size.
const DETAIL_TILE_VIEW_RATIO: f64 = 1.25;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PyramidError {
    #[error("source size must be positive, got {0}")]
    InvalidSourceSize(Size),

    #[error("available size must be positive, got {0}")]
    InvalidAvailableSize(Size),

    #[error("max tile size must be positive, got {0}")]
    InvalidMaxTileSize(Size),

    #[error("full image sample size {0} is not a power of two")]
    InvalidSampleSize(u32),
}

/// Picks the power-of-two decode factor for a given on-screen scale.
///
/// With a minimum tile DPI configured, the scale is first reduced by
/// `min_tile_dpi / screen_dpi` so dense screens decode fewer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleSizeCalculator {
    min_tile_dpi: u32,
    average_dpi: f32,
}

impl SampleSizeCalculator {
    pub fn new(min_tile_dpi: u32, average_dpi: f32) -> Self {
        Self { min_tile_dpi, average_dpi }
    }

    pub fn calculate(&self, source: Size, scale: f32) -> u32 {
        let mut scale = scale;
        if self.min_tile_dpi > 0 && self.average_dpi > 0.0 {
            scale *= self.min_tile_dpi as f32 / self.average_dpi;
        }

        let requested_width = (source.width as f32 * scale) as i32;
        let requested_height = (source.height as f32 * scale) as i32;

        if requested_width <= 0 || requested_height <= 0 {
            return DEGENERATE_SAMPLE_SIZE;
        }

        let mut in_sample_size = 1;
        if source.height > requested_height || source.width > requested_width {
            let height_ratio = (source.height as f32 / requested_height as f32).round() as u32;
            let width_ratio = (source.width as f32 / requested_width as f32).round() as u32;
            in_sample_size = height_ratio.min(width_ratio);
        }

        let mut power = 1;
        while power * 2 < in_sample_size {
            power *= 2;
        }
        power
    }

    /// Sample size of the base layer: one step finer than what the fitted
    /// minimum scale needs, so the fallback layer never looks soft.
    pub fn full_image_sample_size(&self, source: Size, min_scale: f32) -> u32 {
        let sample_size = self.calculate(source, min_scale);
        if sample_size > 1 {
            sample_size / 2
        } else {
            sample_size
        }
    }
}

/// Tiles for every sample size from the base layer down to 1.
#[derive(Debug, Clone)]
pub struct TilePyramid {
    levels: BTreeMap<u32, Vec<Arc<Tile>>>,
    full_image_sample_size: u32,
}

impl TilePyramid {
    pub fn full_image_sample_size(&self) -> u32 {
        self.full_image_sample_size
    }

    /// The always-visible fallback level.
    pub fn base_layer(&self) -> &[Arc<Tile>] {
        self.level(self.full_image_sample_size)
    }

    pub fn level(&self, sample_size: u32) -> &[Arc<Tile>] {
        self.levels.get(&sample_size).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sample sizes from coarsest to finest.
    pub fn sample_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().rev().copied()
    }

    /// Every tile, coarsest level first.
    pub fn tiles(&self) -> impl Iterator<Item = &Arc<Tile>> + '_ {
        self.levels.values().rev().flatten()
    }

    pub fn tile(&self, id: TileId) -> Option<&Arc<Tile>> {
        self.level(id.sample_size).iter().find(|tile| tile.id() == id)
    }

    pub fn tile_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// True if a visible tile of `sample_size` has no pixels yet.
    pub fn has_missing_tiles(&self, sample_size: u32) -> bool {
        self.level(sample_size)
            .iter()
            .any(|tile| tile.is_visible() && !tile.is_loaded())
    }

    /// Releases every bitmap. Used on teardown.
    pub fn recycle_all(&self) -> usize {
        self.tiles().filter(|tile| tile.recycle()).count()
    }
}

/// Builds the tile grid for each level.
///
/// Starting at `full_image_sample_size` and halving down to 1, each level's
/// grid grows until a subsampled tile fits `max_tile_size` and, for levels
/// finer than the base, stays within 1.25 times the view. Grid counts carry
/// over between levels. The last row and column absorb remainder pixels.
pub fn build_pyramid(
    source: Size,
    max_tile_size: Size,
    available: Size,
    full_image_sample_size: u32,
) -> Result<TilePyramid, PyramidError> {
    if !source.is_positive() {
        return Err(PyramidError::InvalidSourceSize(source));
    }
    if !available.is_positive() {
        return Err(PyramidError::InvalidAvailableSize(available));
    }
    if !max_tile_size.is_positive() {
        return Err(PyramidError::InvalidMaxTileSize(max_tile_size));
    }
    if !full_image_sample_size.is_power_of_two() {
        return Err(PyramidError::InvalidSampleSize(full_image_sample_size));
    }

    let mut levels = BTreeMap::new();
    let mut sample_size = full_image_sample_size;
    let mut x_tiles: i32 = 1;
    let mut y_tiles: i32 = 1;

    loop {
        let detail_level = sample_size < full_image_sample_size;
        x_tiles = grow_axis(
            source.width,
            max_tile_size.width,
            available.width,
            sample_size,
            detail_level,
            x_tiles,
        );
        y_tiles = grow_axis(
            source.height,
            max_tile_size.height,
            available.height,
            sample_size,
            detail_level,
            y_tiles,
        );

        let tile_width = source.width / x_tiles;
        let tile_height = source.height / y_tiles;
        let mut grid = Vec::with_capacity((x_tiles * y_tiles) as usize);

        for x in 0..x_tiles {
            for y in 0..y_tiles {
                let rect = Rect::new(
                    x * tile_width,
                    y * tile_height,
                    if x == x_tiles - 1 { source.width } else { (x + 1) * tile_width },
                    if y == y_tiles - 1 { source.height } else { (y + 1) * tile_height },
                );
                let id = TileId::new(sample_size, x as u32, y as u32);
                grid.push(Arc::new(Tile::new(id, rect, sample_size == full_image_sample_size)));
            }
        }

        debug!(sample_size, x_tiles, y_tiles, "built pyramid level");
        levels.insert(sample_size, grid);

        if sample_size == 1 {
            break;
        }
        sample_size /= 2;
    }

    Ok(TilePyramid { levels, full_image_sample_size })
}

fn grow_axis(
    source_len: i32,
    max_tile_len: i32,
    available_len: i32,
    sample_size: u32,
    detail_level: bool,
    mut tiles: i32,
) -> i32 {
    let sample_size = sample_size as i32;
    let too_large = |tiles: i32| {
        let sub_tile = (source_len / tiles) / sample_size;
        sub_tile + tiles + 1 > max_tile_len
            || (detail_level && f64::from(sub_tile) > f64::from(available_len) * DETAIL_TILE_VIEW_RATIO)
    };

    while too_large(tiles) {
        if tiles >= source_len {
            warn!(
                source_len,
                max_tile_len, sample_size, "tile limit unreachable, keeping single-pixel tiles"
            );
            break;
        }
        tiles += 1;
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const MAX_TILE: Size = Size::new(2048, 2048);

    #[test]
    fn test_sample_size_for_quarter_scale() {
        let calc = SampleSizeCalculator::default();
        assert_eq!(calc.calculate(Size::new(4000, 3000), 0.25), 2);
        assert_eq!(calc.calculate(Size::new(4000, 3000), 1.0), 1);
        assert_eq!(calc.calculate(Size::new(4000, 3000), 2.0), 1);
        assert_eq!(calc.calculate(Size::new(4000, 3000), 0.1), 8);
    }

    #[test]
    fn test_degenerate_request_returns_cap() {
        let calc = SampleSizeCalculator::default();
        assert_eq!(calc.calculate(Size::new(4000, 3000), 0.0001), DEGENERATE_SAMPLE_SIZE);
    }

    #[test]
    fn test_min_tile_dpi_lowers_resolution() {
        let plain = SampleSizeCalculator::default();
        let dense = SampleSizeCalculator::new(160, 480.0);

        let source = Size::new(8000, 6000);
        assert_eq!(plain.calculate(source, 0.5), 1);
        assert_eq!(dense.calculate(source, 0.5), 4);
    }

    #[test]
    fn test_sample_size_is_minimal_power_of_two() {
        let calc = SampleSizeCalculator::default();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..500 {
            let source = Size::new(rng.gen_range(1..20_000), rng.gen_range(1..20_000));
            let scale = rng.gen_range(0.01f32..4.0);
            let sample = calc.calculate(source, scale);

            assert!(sample.is_power_of_two());

            let req_w = (source.width as f32 * scale) as i32;
            let req_h = (source.height as f32 * scale) as i32;
            if req_w == 0 || req_h == 0 {
                assert_eq!(sample, DEGENERATE_SAMPLE_SIZE);
                continue;
            }

            let ratio = if source.width > req_w || source.height > req_h {
                ((source.height as f32 / req_h as f32).round() as u32)
                    .min((source.width as f32 / req_w as f32).round() as u32)
            } else {
                1
            };

            // Doubling would reach or pass the downsample the request allows.
            assert!(sample * 2 >= ratio);
            if sample > 1 {
                assert!(sample < ratio);
            }
        }
    }

    #[test]
    fn test_full_image_sample_size_halves() {
        let calc = SampleSizeCalculator::default();
        assert_eq!(calc.full_image_sample_size(Size::new(4000, 3000), 0.1), 4);
        assert_eq!(calc.full_image_sample_size(Size::new(4000, 3000), 1.0), 1);
    }

    #[test]
    fn test_levels_run_from_base_to_one() {
        let pyramid = build_pyramid(Size::new(4000, 3000), MAX_TILE, Size::new(1000, 800), 4)
            .unwrap();

        assert_eq!(pyramid.sample_sizes().collect::<Vec<_>>(), vec![4, 2, 1]);
        assert_eq!(pyramid.base_layer().len(), 1);
        assert!(pyramid.base_layer().iter().all(|tile| tile.is_visible()));
        assert!(pyramid.level(1).iter().all(|tile| !tile.is_visible()));
    }

    #[test]
    fn test_detail_tiles_respect_view_cap() {
        let available = Size::new(1000, 800);
        let pyramid = build_pyramid(Size::new(4000, 3000), MAX_TILE, available, 4).unwrap();

        for sample_size in [2, 1] {
            for tile in pyramid.level(sample_size) {
                let rect = tile.source_rect();
                assert!(rect.width() / sample_size as i32 <= (available.width as f32 * 1.25) as i32);
                assert!(rect.height() / sample_size as i32 <= (available.height as f32 * 1.25) as i32);
            }
        }
    }

    #[test]
    fn test_max_tile_size_splits_base_layer() {
        let pyramid = build_pyramid(Size::new(5000, 1000), Size::new(2048, 2048), Size::new(500, 500), 1)
            .unwrap();

        let base = pyramid.base_layer();
        assert_eq!(base.len(), 3);
        assert!(base.iter().all(|tile| tile.source_rect().width() + 3 + 1 <= 2048));
    }

    #[test]
    fn test_levels_partition_source_exactly() {
        let mut rng = StdRng::seed_from_u64(19);

        for _ in 0..40 {
            let source = Size::new(rng.gen_range(1..8_000), rng.gen_range(1..8_000));
            let available = Size::new(rng.gen_range(500..2000), rng.gen_range(500..2000));
            let max_tile = Size::new(rng.gen_range(1024..4096), rng.gen_range(1024..4096));
            let full = 1 << rng.gen_range(0..5);

            let pyramid = build_pyramid(source, max_tile, available, full).unwrap();

            for sample_size in pyramid.sample_sizes() {
                let tiles = pyramid.level(sample_size);
                let area: i64 = tiles.iter().map(|tile| tile.source_rect().area()).sum();
                assert_eq!(area, i64::from(source.width) * i64::from(source.height));

                for (i, a) in tiles.iter().enumerate() {
                    let rect = a.source_rect();
                    assert!(rect.left >= 0 && rect.top >= 0);
                    assert!(rect.right <= source.width && rect.bottom <= source.height);
                    for b in &tiles[i + 1..] {
                        assert!(!rect.intersects(&b.source_rect()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let view = Size::new(100, 100);
        assert_eq!(
            build_pyramid(Size::new(0, 10), MAX_TILE, view, 1).unwrap_err(),
            PyramidError::InvalidSourceSize(Size::new(0, 10))
        );
        assert_eq!(
            build_pyramid(Size::new(10, 10), Size::ZERO, view, 1).unwrap_err(),
            PyramidError::InvalidMaxTileSize(Size::ZERO)
        );
        assert_eq!(
            build_pyramid(Size::new(10, 10), MAX_TILE, view, 3).unwrap_err(),
            PyramidError::InvalidSampleSize(3)
        );
    }

    #[test]
    fn test_missing_tiles_track_visible_unloaded() {
        let pyramid = build_pyramid(Size::new(400, 300), MAX_TILE, Size::new(100, 100), 2).unwrap();
        assert!(pyramid.has_missing_tiles(2));
        assert!(!pyramid.has_missing_tiles(1));

        for tile in pyramid.base_layer() {
            let ticket = tile.begin_loading().unwrap();
            tile.complete(
                ticket,
                Ok(crate::Bitmap::new(crate::RgbaImage::new(1, 1))),
            );
        }
        assert!(!pyramid.has_missing_tiles(2));
        assert_eq!(pyramid.recycle_all(), pyramid.base_layer().len());
    }
}

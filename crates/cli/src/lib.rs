use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_core::{EngineConfig, ImageEngine, MaxTileSize};
use tessera_render::{FileSource, RasterRegionDecoder, RegionDecoder};
use tessera_viewer_core::{PointF, Rect, Size};
use tracing_subscriber::EnvFilter;

/// How long `render` waits for visible tiles before giving up.
const TILE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "tessera")]
#[command(about = "Inspect and render images through the tiled viewer engine")]
pub struct Cli {
    /// Log engine decisions to stderr. RUST_LOG overrides this.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML). Defaults to TESSERA_* variables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print image dimensions, scale bounds and pyramid levels as JSON.
    Info {
        #[arg(value_name = "IMAGE")]
        file: PathBuf,
        #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1280x720")]
        viewport: Size,
    },
    /// Print the tile grid of every pyramid level as JSON.
    Pyramid {
        #[arg(value_name = "IMAGE")]
        file: PathBuf,
        #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1280x720")]
        viewport: Size,
        /// Square tile size limit in pixels.
        #[arg(long, value_name = "N")]
        max_tile: Option<u32>,
    },
    /// Compose the visible tiles into a PNG, as a host renderer would.
    Render {
        #[arg(value_name = "IMAGE")]
        file: PathBuf,
        #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1280x720")]
        viewport: Size,
        /// Scale to show. Clamped to the image's scale bounds.
        #[arg(long)]
        scale: Option<f32>,
        /// Source point to center, as X,Y.
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        center: Option<PointF>,
        #[arg(long)]
        max_tile: Option<u32>,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    width: i32,
    height: i32,
    viewport: Size,
    min_scale: f32,
    max_scale: f32,
    double_tap_zoom_scale: f32,
    full_image_sample_size: u32,
    levels: Vec<LevelSummary>,
}

#[derive(Debug, Serialize)]
struct LevelSummary {
    sample_size: u32,
    columns: u32,
    rows: u32,
    tiles: usize,
}

#[derive(Debug, Serialize)]
struct PyramidOutput {
    width: i32,
    height: i32,
    max_tile_size: Size,
    full_image_sample_size: u32,
    levels: Vec<PyramidLevel>,
}

#[derive(Debug, Serialize)]
struct PyramidLevel {
    sample_size: u32,
    columns: u32,
    rows: u32,
    tiles: Vec<TileOutput>,
}

#[derive(Debug, Serialize)]
struct TileOutput {
    x: u32,
    y: u32,
    source_rect: Rect,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { file, viewport } => {
            let config = load_config(cli.config.as_deref(), None)?;
            run_info(&file, viewport, config)
        }
        Commands::Pyramid { file, viewport, max_tile } => {
            let config = load_config(cli.config.as_deref(), max_tile)?;
            run_pyramid(&file, viewport, config)
        }
        Commands::Render { file, viewport, scale, center, max_tile, output } => {
            let config = load_config(cli.config.as_deref(), max_tile)?;
            run_render(&file, viewport, scale, center, &output, config)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    // A second call in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, max_tile: Option<u32>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::from_env().context("invalid TESSERA_* environment")?,
    };

    if let Some(side) = max_tile {
        config = config.with_max_tile_size(MaxTileSize::Fixed(side));
        config.validate().context("invalid --max-tile")?;
    }
    Ok(config)
}

fn open_engine(file: &Path, viewport: Size, config: EngineConfig) -> Result<ImageEngine> {
    ensure_file_exists(file)?;

    let provider = || Arc::new(RasterRegionDecoder::new()) as Arc<dyn RegionDecoder>;
    let mut engine = ImageEngine::new(config, provider)?;
    engine.set_available_size(viewport)?;
    engine
        .initialize(&FileSource::new(file))
        .with_context(|| format!("failed to open image {}", file.display()))?;
    Ok(engine)
}

fn run_info(file: &Path, viewport: Size, config: EngineConfig) -> Result<()> {
    let engine = open_engine(file, viewport, config)?;
    let (Some(view), Some(scheduler)) = (engine.viewport(), engine.scheduler()) else {
        anyhow::bail!("engine has no session after initialization");
    };
    let pyramid = scheduler.pyramid();

    let levels = pyramid
        .sample_sizes()
        .map(|sample_size| {
            let tiles = pyramid.level(sample_size);
            let (columns, rows) = grid_dimensions(tiles.iter().map(|tile| tile.id()));
            LevelSummary { sample_size, columns, rows, tiles: tiles.len() }
        })
        .collect();

    let source = view.source();
    let payload = InfoOutput {
        path: file.display().to_string(),
        width: source.width,
        height: source.height,
        viewport,
        min_scale: view.min_scale(),
        max_scale: view.max_scale(),
        double_tap_zoom_scale: view.double_tap_zoom_scale(),
        full_image_sample_size: pyramid.full_image_sample_size(),
        levels,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_pyramid(file: &Path, viewport: Size, config: EngineConfig) -> Result<()> {
    let max_tile_size = config.max_tile_size.resolve(None);
    let engine = open_engine(file, viewport, config)?;
    let (Some(view), Some(scheduler)) = (engine.viewport(), engine.scheduler()) else {
        anyhow::bail!("engine has no session after initialization");
    };
    let pyramid = scheduler.pyramid();

    let levels = pyramid
        .sample_sizes()
        .map(|sample_size| {
            let tiles = pyramid.level(sample_size);
            let (columns, rows) = grid_dimensions(tiles.iter().map(|tile| tile.id()));
            let tiles = tiles
                .iter()
                .map(|tile| {
                    let id = tile.id();
                    TileOutput { x: id.x, y: id.y, source_rect: tile.source_rect() }
                })
                .collect();
            PyramidLevel { sample_size, columns, rows, tiles }
        })
        .collect();

    let source = view.source();
    let payload = PyramidOutput {
        width: source.width,
        height: source.height,
        max_tile_size,
        full_image_sample_size: pyramid.full_image_sample_size(),
        levels,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_render(
    file: &Path,
    viewport: Size,
    scale: Option<f32>,
    center: Option<PointF>,
    output: &Path,
    config: EngineConfig,
) -> Result<()> {
    let mut engine = open_engine(file, viewport, config)?;

    if scale.is_some() || center.is_some() {
        let Some(view) = engine.viewport() else {
            anyhow::bail!("engine has no session after initialization");
        };
        let scale = scale.unwrap_or(view.scale());
        let center = center.unwrap_or(view.center());
        engine.set_scale_and_center(scale, center);
    }

    let deadline = Instant::now() + TILE_TIMEOUT;
    // Failed tiles never load, so stop once nothing is in flight.
    while engine.has_missing_tiles()
        && engine.scheduler().is_some_and(|scheduler| scheduler.pending_jobs() > 0)
    {
        if Instant::now() > deadline {
            anyhow::bail!("timed out waiting for tiles");
        }
        thread::sleep(Duration::from_millis(5));
    }

    let canvas = compose(&engine, viewport);

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    canvas
        .save(output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

/// Paints drawable tiles in order onto a transparent canvas of the view size.
fn compose(engine: &ImageEngine, viewport: Size) -> RgbaImage {
    let mut canvas =
        RgbaImage::from_pixel(viewport.width as u32, viewport.height as u32, Rgba([0, 0, 0, 0]));

    for tile in engine.drawable_tiles() {
        let rect = tile.screen_rect;
        if rect.is_empty() {
            continue;
        }

        let bitmap = tile.bitmap.as_image();
        let (width, height) = (rect.width() as u32, rect.height() as u32);
        let scaled = if bitmap.dimensions() == (width, height) {
            bitmap.clone()
        } else {
            imageops::resize(bitmap, width, height, FilterType::Triangle)
        };
        imageops::overlay(&mut canvas, &scaled, i64::from(rect.left), i64::from(rect.top));
    }

    tracing::debug!(width = viewport.width, height = viewport.height, "composed frame");
    canvas
}

fn grid_dimensions(ids: impl Iterator<Item = tessera_render::TileId>) -> (u32, u32) {
    ids.fold((0, 0), |(columns, rows), id| (columns.max(id.x + 1), rows.max(id.y + 1)))
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn parse_size(value: &str) -> std::result::Result<Size, String> {
    let (width, height) =
        value.split_once(['x', 'X']).ok_or_else(|| format!("expected WxH, got {value:?}"))?;
    let width: i32 = width.trim().parse().map_err(|_| format!("bad width in {value:?}"))?;
    let height: i32 = height.trim().parse().map_err(|_| format!("bad height in {value:?}"))?;

    let size = Size::new(width, height);
    if !size.is_positive() {
        return Err(format!("size must be positive, got {value:?}"));
    }
    Ok(size)
}

fn parse_point(value: &str) -> std::result::Result<PointF, String> {
    let (x, y) = value.split_once(',').ok_or_else(|| format!("expected X,Y, got {value:?}"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad x in {value:?}"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad y in {value:?}"))?;
    Ok(PointF::new(x, y))
}

//! karaoke-stream - render subtitle textures headlessly
//!
//! Loads an ASS file, walks a time range frame by frame through the texture
//! streamer and prints the resulting cache statistics as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use karaoke_stream::OverlaySettings;
use karaoke_stream::SubtitleOverlay;
use karaoke_stream::render::{GlyphRasterizer, WgpuSurface};

#[derive(Parser, Debug)]
#[command(name = "karaoke-stream")]
#[command(version)]
#[command(about = "Render ASS subtitles and karaoke to GPU textures", long_about = None)]
struct Args {
    /// ASS subtitle file
    subtitle: PathBuf,

    /// TTF/OTF font used for rasterizing
    #[arg(short, long)]
    font: PathBuf,

    /// First timestamp in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Last timestamp in seconds (defaults to the end of the last line)
    #[arg(long)]
    end: Option<f64>,

    /// Frames per second
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Viewport width (overrides settings)
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height (overrides settings)
    #[arg(long)]
    height: Option<u32>,

    /// Path to settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if !args.fps.is_finite() || args.fps <= 0.0 {
        anyhow::bail!("fps must be positive, got {}", args.fps);
    }

    let mut settings = match &args.config {
        Some(path) => OverlaySettings::load_from_file(path)
            .with_context(|| format!("failed to load settings from {:?}", path))?,
        None => OverlaySettings::load(),
    };
    if let Some(width) = args.width {
        settings.viewport_width = width;
    }
    if let Some(height) = args.height {
        settings.viewport_height = height;
    }

    let surface = Arc::new(WgpuSurface::headless().context("failed to create GPU device")?);
    let rasterizer = GlyphRasterizer::from_file(&args.font).context("failed to load font")?;
    let mut overlay = SubtitleOverlay::from_settings(&settings, Box::new(rasterizer), surface)
        .context("invalid settings")?;
    overlay.load_subtitle_file(&args.subtitle)?;

    let end = args.end.unwrap_or_else(|| {
        overlay
            .dataset()
            .lines
            .iter()
            .map(|line| line.end_time)
            .fold(args.start, f64::max)
    });

    let mut frames = 0usize;
    let mut layers = 0usize;
    for i in 0usize.. {
        let timestamp = args.start + i as f64 / args.fps;
        if timestamp >= end {
            break;
        }
        // Preload failures are logged by the streamer
        overlay.preload(timestamp, end, args.fps)?;
        match overlay.render_frame(timestamp) {
            Ok(Some(frame)) => {
                frames += 1;
                layers += frame.textures.len();
            }
            Ok(None) => {}
            Err(e) => warn!("Frame at {:.3}s failed: {}", timestamp, e),
        }
    }
    info!("Rendered {} frames with subtitles ({} texture layers)", frames, layers);

    let stats = overlay.performance_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    overlay.cleanup();
    Ok(())
}

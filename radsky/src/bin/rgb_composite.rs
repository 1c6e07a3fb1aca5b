//! RGB composite with radio contours for a sky position
//!
//! Fetches every configured survey around the target from SkyView, stacks the
//! three bands of the chosen composite and overlays radio contours.
//!
//! # Usage
//!
//! ```bash
//! # IOU composite with TGSS contours
//! cargo run --release --bin rgb_composite -- --position "M51" --composite IOU --contour TGSS
//!
//! # The dataset figure: IOU with TGSS (red) and NVSS (blue) contours, as SVG
//! cargo run --release --bin rgb_composite -- --position "202.47, 47.19" --dual -o m51.svg
//!
//! # Reuse downloaded cutouts between runs
//! cargo run --release --bin rgb_composite -- --position "M51" --cache-dir cutouts
//! ```

use anyhow::Context;
use clap::Parser;
use radsky::config::PipelineConfig;
use radsky::figure::Figure;
use radsky::render;
use radsky::retrieval::{fetch_bands, CachedService, CutoutService, SkyViewClient};
use radsky::sky_position::SkyPosition;
use radsky::survey::{CompositeKey, ContourKey};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "RGB survey composite with radio contour overlays")]
struct Args {
    /// Target name or coordinates ("150.1, 2.2" or "10 00 24.0 +02 12 00")
    #[arg(short, long)]
    position: String,

    /// Cutout radius in degrees; cutouts span twice this
    #[arg(short, long, default_value_t = 0.05)]
    radius: f64,

    /// Composite: Optical, IOU or ROR
    #[arg(short, long, default_value = "IOU")]
    composite: CompositeKey,

    /// Contour survey: TGSS or NVSS
    #[arg(long, default_value = "TGSS")]
    contour: ContourKey,

    /// Overlay both TGSS (red) and NVSS (blue) contours instead of one
    #[arg(long)]
    dual: bool,

    /// Output figure, PNG or SVG by extension
    #[arg(short, long, default_value = "composite.png")]
    output: PathBuf,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for cached FITS cutouts (overrides the configuration)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let position = SkyPosition::parse(&args.position, args.radius)
        .with_context(|| format!("Invalid position '{}'", args.position))?;

    let client = SkyViewClient::new(&config.retrieval);
    let service: Box<dyn CutoutService> = match args.cache_dir.or(config.retrieval.cache_dir.clone()) {
        Some(dir) => Box::new(CachedService::new(client, dir)),
        None => Box::new(client),
    };

    println!("Fetching {} surveys around {position}", config.retrieval.surveys().len());
    let bands = fetch_bands(&service, &position, &config.retrieval)
        .context("Survey retrieval failed")?;

    let failed = bands.failed();
    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|s| s.to_string()).collect();
        println!("Zero-filled bands: {}", names.join(", "));
    }

    let figure = if args.dual {
        Figure::dual_contours(
            &bands,
            args.composite,
            [ContourKey::Tgss, ContourKey::Nvss],
            &config.contour,
        )
    } else {
        Figure::rgb_with_contours(&bands, args.composite, args.contour, &config.contour)
    }
    .context("Failed to build figure")?;

    render::save(&figure, &args.output)
        .with_context(|| format!("Failed to save figure to {}", args.output.display()))?;
    println!("{} -> {}", figure.title, args.output.display());

    Ok(())
}

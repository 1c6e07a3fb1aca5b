//! Detect and measure sources in a FITS image
//!
//! Prints the sky position of every source, faintest peak first, and
//! optionally writes the full property table as CSV.
//!
//! ```bash
//! cargo run --release --bin source_extract -- field.fits --csv sources.csv
//! cargo run --release --bin source_extract -- field.fits --threshold 0.05
//! ```

use anyhow::Context;
use clap::Parser;
use radsky::config::PipelineConfig;
use radsky::photometry::SourceExtractor;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Source detection and photometry on a FITS image")]
struct Args {
    /// FITS image to process
    fits: PathBuf,

    /// Write the source table to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Detection threshold in image units (overrides the configuration)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut detection = match &args.config {
        Some(path) => {
            PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
                .detection
        }
        None => PipelineConfig::default().detection,
    };
    if let Some(threshold) = args.threshold {
        detection.threshold = threshold;
    }

    let extractor = SourceExtractor::open(&args.fits, &detection)
        .with_context(|| format!("Failed to process {}", args.fits.display()))?;
    let catalog = extractor.catalog();
    println!("{} sources in {}", catalog.len(), args.fits.display());

    if extractor.wcs().is_some() {
        for (source, position) in catalog.iter().zip(catalog.positions()?) {
            println!("{:>4}  {position}  peak {:.4e}", source.id, source.max_value);
        }
    } else {
        for source in catalog {
            println!(
                "{:>4}  x {:.2}  y {:.2}  peak {:.4e}",
                source.id, source.xcentroid, source.ycentroid, source.max_value
            );
        }
    }

    if let Some(path) = &args.csv {
        catalog
            .write_csv(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

//! Submit SkyView's query form for coordinates typed at a prompt
//!
//! Posts the radio-optical-radio overlay with TGSS contours (600 px over
//! 0.1°) and saves the returned page.

use anyhow::Context;
use clap::Parser;
use radsky::config::PipelineConfig;
use radsky::form::{FormSubmitter, QueryForm};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fill and submit the SkyView query form")]
struct Args {
    /// Where to save the returned page
    #[arg(short, long, default_value = "skyview_result.html")]
    output: PathBuf,

    /// Number of contour levels (service default when omitted)
    #[arg(long)]
    cont_num: Option<u32>,

    /// Upper contour limit; sends the contour range starting at 0.015
    #[arg(long)]
    cont_max: Option<f64>,

    /// Pipeline configuration JSON (for the service URL and timeout)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    print!("Coordinates : ");
    std::io::stdout().flush()?;
    let mut coordinates = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut coordinates)
        .context("Failed to read coordinates")?;
    if coordinates.trim().is_empty() {
        anyhow::bail!("No coordinates given");
    }

    let mut form = QueryForm::for_object(&coordinates);
    form.cont_num = args.cont_num;
    form.cont_max = args.cont_max;

    let submitter = FormSubmitter::new(&config.retrieval);
    let response = submitter.submit(&form)?;
    if !response.is_success() {
        log::warn!("Form returned HTTP {}", response.status);
    }

    std::fs::write(&args.output, &response.body)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "HTTP {}: saved {} bytes to {}",
        response.status,
        response.body.len(),
        args.output.display()
    );
    Ok(())
}

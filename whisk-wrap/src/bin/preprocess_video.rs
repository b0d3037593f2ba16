//! preprocess-video - invert, crop and transcode a raw capture
//!
//! ```bash
//! preprocess-video <subject> <date> <site> <grab> <width> <height> <x> <y>
//! ```
//!
//! Writes `<raw stem>.<prepared extension>` next to the raw capture. No
//! output slot is allocated and no metadata is written.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use whisk_wrap::services::CropRect;
use whisk_wrap::{Pipeline, SessionKey, SystemRunner, WrapConfig};

/// Raw capture preprocessing
#[derive(Parser, Debug)]
#[command(name = "preprocess-video", version)]
#[command(about = "Invert, crop and transcode the raw whisker video of one session")]
struct Args {
    subject: String,
    date: String,
    site: String,
    grab: String,

    /// Crop width in pixels
    width: u64,
    /// Crop height in pixels
    height: u64,
    /// Left edge of the crop
    x: u64,
    /// Top edge of the crop
    y: u64,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the raw data hierarchy
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = WrapConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    whisk_wrap::init_tracing(&config.logging.level);
    whisk_wrap::log_build_info("preprocess-video");

    let session = SessionKey::parse(&args.subject, &args.date, &args.site, &args.grab)
        .context("Invalid session key")?;
    let crop = CropRect {
        x: args.x,
        y: args.y,
        width: args.width,
        height: args.height,
    };

    let runner = SystemRunner;
    let pipeline = Pipeline::new(&config, config.resolve_data_root(args.data_root.as_deref()), &runner);

    let prepared = pipeline
        .preprocess_only(&session, &crop)
        .with_context(|| format!("Preprocessing failed for session {}", session))?;

    info!(path = %prepared.path.display(), "Prepared video written");
    Ok(())
}

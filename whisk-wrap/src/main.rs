//! whisk-wrap - whisker tracing for one recording session
//!
//! ```bash
//! whisk-wrap <subject> <date> <site> <grab> <params_file> [--crop W H X Y] [--dummy] [--transfer]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use whisk_wrap::services::CropRect;
use whisk_wrap::{Pipeline, RunOptions, SessionKey, SystemRunner, WrapConfig};

/// Whisker tracing orchestrator
#[derive(Parser, Debug)]
#[command(name = "whisk-wrap", version)]
#[command(about = "Trace whiskers in the video of one recording session")]
struct Args {
    /// Subject (mouse) identifier
    subject: String,

    /// Session date, YYYY-MM-DD
    date: String,

    /// Imaging site, e.g. site1
    site: String,

    /// Grab, e.g. grab01
    grab: String,

    /// JSON tracing parameter record
    params_file: PathBuf,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the raw data hierarchy
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Preprocess the raw capture with this crop first
    #[arg(long, num_args = 4, value_names = ["W", "H", "X", "Y"])]
    crop: Option<Vec<u64>>,

    /// Skip the tracing engine and write a placeholder artifact
    #[arg(long)]
    dummy: bool,

    /// Copy the output slot to the mirror host afterwards
    #[arg(long)]
    transfer: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = WrapConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    whisk_wrap::init_tracing(&config.logging.level);
    whisk_wrap::log_build_info("whisk-wrap");

    let session = SessionKey::parse(&args.subject, &args.date, &args.site, &args.grab)
        .context("Invalid session key")?;

    let data_root = config.resolve_data_root(args.data_root.as_deref());
    info!(data_root = %data_root.display(), "Data root");

    let options = RunOptions {
        crop_override: args.crop.as_deref().map(|c| CropRect {
            width: c[0],
            height: c[1],
            x: c[2],
            y: c[3],
        }),
        force_dummy: args.dummy,
        transfer: args.transfer,
    };

    let runner = SystemRunner;
    let pipeline = Pipeline::new(&config, data_root, &runner);

    match pipeline.run(&session, &args.params_file, &options) {
        Ok(summary) => {
            info!(
                artifact = %summary.artifact.display(),
                metadata = %summary.metadata_path.display(),
                "Finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(session = %session, "Run failed: {}", e);
            Err(e).with_context(|| {
                format!(
                    "Whisker tracing failed for session {} (parameters {})",
                    session,
                    args.params_file.display()
                )
            })
        }
    }
}

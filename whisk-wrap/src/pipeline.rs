//! Pipeline orchestrator
//!
//! Runs one session end to end:
//!
//! 1. Parameters: load and normalize the record, extract the typed views,
//!    check the transfer settings
//! 2. Discovery: locate the input video (raw capture when preprocessing) and
//!    decide whether an existing prepared video can be reused
//! 3. Slot: allocate the next `<prefix><N>` output directory
//! 4. Preprocessing (optional): invert/crop/transcode unless already prepared,
//!    then locate the prepared video
//! 5. Tracing: run the engine, or write a placeholder in dummy mode
//! 6. Metadata: checksum inputs and outputs, write the provenance record
//! 7. Transfer (optional): copy the slot to the mirror host
//!
//! Every stage is blocking. The first failure ends the run; earlier stages
//! are not rolled back, and no metadata is written for a failed run.

use crate::config::WrapConfig;
use crate::error::PipelineResult;
use crate::process::ToolRunner;
use crate::services::{
    prepared_path, probe_dependencies, CropRect, EncodeSettings, MetadataRecorder, ModeFlags,
    OutputSlot, OutputTransfer, OutputVersioner, ParameterNormalizer, Preprocessor, RunContext,
    SessionLocator, TraceInvoker, TraceSettings, VideoAsset,
};
use crate::session::SessionKey;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Per-invocation switches from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Crop rectangle; forces preprocessing and overrides the parameter record
    pub crop_override: Option<CropRect>,
    /// Dummy run regardless of the `debug` parameter
    pub force_dummy: bool,
    /// Transfer the slot even if `[transfer] enabled` is false
    pub transfer: bool,
}

/// What a successful run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Video handed to the pipeline (raw capture when preprocessed)
    pub input: VideoAsset,
    /// Video handed to the tracing engine
    pub traced: VideoAsset,
    pub slot: OutputSlot,
    pub artifact: PathBuf,
    pub dummy: bool,
    pub metadata_path: PathBuf,
    /// Remote slot location, when transferred
    pub transferred_to: Option<PathBuf>,
}

/// Sequences the pipeline stages for one session
pub struct Pipeline<'a> {
    config: &'a WrapConfig,
    locator: SessionLocator,
    runner: &'a dyn ToolRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a WrapConfig, data_root: impl Into<PathBuf>, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            locator: SessionLocator::new(data_root),
            runner,
        }
    }

    pub fn data_root(&self) -> &Path {
        self.locator.data_root()
    }

    /// Run the full pipeline for `session` with the parameter record at `params_path`
    pub fn run(
        &self,
        session: &SessionKey,
        params_path: &Path,
        options: &RunOptions,
    ) -> PipelineResult<RunSummary> {
        let context = RunContext::start(session.clone());
        info!(session = %session, run_id = %context.run_id, "Starting whisker tracing run");

        // Phase 1: parameters
        let params = ParameterNormalizer::default().load(params_path)?;
        let settings = TraceSettings::from_params(&params)?;
        let crop = match options.crop_override {
            Some(crop) => Some(crop),
            None => CropRect::from_params(&params)?,
        };
        let encode = EncodeSettings::from_params(&params)?;
        let dummy = options.force_dummy || settings.debug;
        let transfer = if options.transfer || self.config.transfer.enabled {
            Some(OutputTransfer::from_config(
                self.runner,
                &self.config.scp,
                &self.config.transfer,
            )?)
        } else {
            None
        };

        // Phase 2: discovery
        let input_extension = if crop.is_some() {
            &self.config.raw_extension
        } else {
            &self.config.prepared_extension
        };
        let input = self.locator.locate(session, input_extension)?;

        // A prepared video left by an earlier run is traced as is
        let preprocess = match crop {
            Some(crop) => {
                let output = prepared_path(&input, &self.config.prepared_extension);
                if output.exists() {
                    info!(path = %output.display(), "Prepared video already present, skipping preprocessing");
                    None
                } else {
                    Some((crop, output))
                }
            }
            None => None,
        };

        // Phase 3: output slot
        let video_directory = self.locator.video_directory(session);
        let slot = OutputVersioner::new(&self.config.output_prefix).allocate_slot(&video_directory)?;

        // Phase 4: preprocessing
        if let Some((crop, output)) = &preprocess {
            Preprocessor::new(self.runner, &self.config.ffmpeg)
                .with_encode(encode)
                .preprocess(&input, crop, output)?;
        }
        let traced = if crop.is_some() {
            self.locator.locate(session, &self.config.prepared_extension)?
        } else {
            input.clone()
        };

        // Phase 5: tracing
        let trace = TraceInvoker::new(self.runner, &self.config.trace_engine)
            .run_trace(&traced, &settings, &slot, dummy)?;

        // Phase 6: metadata
        let dependencies = probe_dependencies(
            self.runner,
            &self.config.ffmpeg,
            &self.config.trace_engine,
            trace.dummy,
        );
        let mode = ModeFlags {
            dummy: trace.dummy,
            preprocessed: preprocess.is_some(),
            skip_stitch: settings.skip_stitch,
            legacy_output_naming: settings.legacy_output_naming,
        };
        let mut inputs = vec![input.path.clone()];
        if traced.path != input.path {
            inputs.push(traced.path.clone());
        }
        let metadata_path = video_directory.join(&self.config.metadata_filename);
        let run_id = context.run_id;
        MetadataRecorder::new(context, mode, dependencies).record(
            &inputs,
            &[trace.artifact.clone()],
            &params,
            &metadata_path,
        )?;

        // Phase 7: transfer
        let transferred_to = match &transfer {
            Some(transfer) => Some(transfer.transfer(&slot)?),
            None => None,
        };

        info!(
            session = %session,
            slot = %slot.path.display(),
            artifact = %trace.artifact.display(),
            dummy = trace.dummy,
            "Run complete"
        );

        Ok(RunSummary {
            run_id,
            input,
            traced,
            slot,
            artifact: trace.artifact,
            dummy: trace.dummy,
            metadata_path,
            transferred_to,
        })
    }

    /// Preprocess the raw capture of `session` only; no slot, no metadata
    pub fn preprocess_only(&self, session: &SessionKey, crop: &CropRect) -> PipelineResult<VideoAsset> {
        info!(session = %session, crop = %crop, "Preprocessing raw capture");

        let input = self.locator.locate(session, &self.config.raw_extension)?;
        let output = prepared_path(&input, &self.config.prepared_extension);
        let prepared = Preprocessor::new(self.runner, &self.config.ffmpeg).preprocess(&input, crop, &output)?;

        info!(output = %prepared.path.display(), "Preprocessing complete");
        Ok(prepared)
    }
}

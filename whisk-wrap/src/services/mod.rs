//! Pipeline stages
//!
//! Each stage owns its error type; [`crate::pipeline`] sequences them.

pub mod metadata_recorder;
pub mod output_transfer;
pub mod output_versioner;
pub mod parameter_normalizer;
pub mod preprocessor;
pub mod session_locator;
pub mod trace_invoker;

pub use metadata_recorder::{
    probe_dependencies, DependencyVersions, MetadataError, MetadataRecord, MetadataRecorder,
    ModeFlags, RunContext, SoftwareInfo, ENGINE_SKIPPED,
};
pub use output_transfer::{OutputTransfer, TransferError};
pub use output_versioner::{OutputSlot, OutputVersioner, SlotError};
pub use parameter_normalizer::{
    Face, ParamError, ParamValue, ParameterNormalizer, ParameterSet, WHISK_SCHEMA,
};
pub use preprocessor::{prepared_path, CropRect, EncodeSettings, PreprocessError, Preprocessor};
pub use session_locator::{LocateError, SessionLocator, VideoAsset};
pub use trace_invoker::{TraceError, TraceInvoker, TraceRequest, TraceResult, TraceSettings};

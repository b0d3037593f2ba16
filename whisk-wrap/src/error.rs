//! Error types for whisk-wrap
//!
//! Every stage reports through its own enum; [`PipelineError`] is what a
//! run returns. Nothing is retried and nothing is rolled back.

use crate::services::{
    LocateError, MetadataError, ParamError, PreprocessError, SlotError, TraceError, TransferError,
};
use crate::session::SessionKeyError;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed subject/date/site/grab
    #[error(transparent)]
    SessionKey(#[from] SessionKeyError),

    /// Video discovery failed
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// Parameter record rejected
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Output slot allocation failed
    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// whisk-common error
    #[error("Common error: {0}")]
    Common(#[from] whisk_common::Error),
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;

//! # whisk-common
//!
//! Shared code for the whisk-wrap tools including:
//! - Common error type
//! - Root folder and configuration file resolution
//! - SHA-256 file checksums
//! - Atomic file writes
//! - Timestamp helpers

pub mod checksum;
pub mod config;
pub mod error;
pub mod files;
pub mod time;

pub use error::{Error, Result};

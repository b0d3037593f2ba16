//! Mirror-host transfer of finished output slots
//!
//! The data tree exists under different roots on the processing host and on
//! the mirror. A slot at `<local_root>/<rel>` is copied with
//! `scp -r <slot> <host>:<remote_root>/<rel parent>`.

use crate::config::TransferConfig;
use crate::process::{ProcessError, ToolInvocation, ToolRunner};
use crate::services::output_versioner::OutputSlot;
use crate::services::preprocessor::exit_status;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// `[transfer]` lacks a required setting
    #[error("Transfer is not configured: missing '{0}' in [transfer]")]
    NotConfigured(&'static str),

    /// Slot is not below the configured local root
    #[error("{path} is not under the transfer local root {local_root}")]
    OutsideLocalRoot { path: PathBuf, local_root: PathBuf },

    #[error(transparent)]
    Launch(#[from] ProcessError),

    /// scp ran but failed
    #[error("Transfer of {path} to {destination} failed ({status}): {stderr}")]
    TransferFailure {
        path: PathBuf,
        destination: String,
        status: String,
        stderr: String,
    },
}

/// Copies output slots to the mirror host
pub struct OutputTransfer<'a> {
    runner: &'a dyn ToolRunner,
    scp: PathBuf,
    host: String,
    local_root: PathBuf,
    remote_root: PathBuf,
}

impl<'a> OutputTransfer<'a> {
    /// Build from `[transfer]`; host and both roots must be set
    pub fn from_config(
        runner: &'a dyn ToolRunner,
        scp: impl Into<PathBuf>,
        config: &TransferConfig,
    ) -> Result<Self, TransferError> {
        Ok(Self {
            runner,
            scp: scp.into(),
            host: config.host.clone().ok_or(TransferError::NotConfigured("host"))?,
            local_root: config
                .local_root
                .clone()
                .ok_or(TransferError::NotConfigured("local_root"))?,
            remote_root: config
                .remote_root
                .clone()
                .ok_or(TransferError::NotConfigured("remote_root"))?,
        })
    }

    /// Map a local path onto the remote root
    pub fn remote_path(&self, local: &Path) -> Result<PathBuf, TransferError> {
        let relative = local
            .strip_prefix(&self.local_root)
            .map_err(|_| TransferError::OutsideLocalRoot {
                path: local.to_path_buf(),
                local_root: self.local_root.clone(),
            })?;
        Ok(self.remote_root.join(relative))
    }

    /// Copy `slot` recursively into its remote parent directory
    pub fn transfer(&self, slot: &OutputSlot) -> Result<PathBuf, TransferError> {
        let remote = self.remote_path(&slot.path)?;
        let remote_parent = remote.parent().unwrap_or(self.remote_root.as_path());
        let destination = format!("{}:{}", self.host, remote_parent.display());

        let invocation = ToolInvocation::new(&self.scp)
            .arg("-r")
            .arg(&slot.path)
            .arg(&destination);

        tracing::info!(
            slot = %slot.path.display(),
            destination = %destination,
            "Transferring output slot"
        );

        let output = self.runner.run(&invocation)?;
        if !output.success {
            return Err(TransferError::TransferFailure {
                path: slot.path.clone(),
                destination,
                status: exit_status(output.code),
                stderr: output.stderr_tail(10),
            });
        }

        Ok(remote)
    }
}

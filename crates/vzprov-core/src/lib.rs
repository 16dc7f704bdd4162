//! Provisioning core for vzprov.
//!
//! This crate turns a partially specified container spec into a created,
//! configured container: ID allocation, DNS-derived address defaulting, the
//! create/configure/network state machine driven through a `CommandExecutor`,
//! and the parse-merge-replace cycle over the `NETIF` line of a container's
//! configuration file. The `Engine` is the entry point.

pub mod address;
pub mod allocator;
pub mod engine;
pub mod interrupt;
pub mod lifecycle;
pub mod netconf;
pub mod session;

pub use address::resolve_address;
pub use allocator::{allocate, next_free};
pub use engine::{Engine, ProvisionError, ProvisionReport};
pub use interrupt::{install_signal_handler, shutdown_requested};
pub use lifecycle::{validate_transition, ProvisionState};
pub use netconf::{reconcile, ConfLock, ContainerConf, Reconciled, NETIF_KEY};
pub use session::{IssuedCommand, Session};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("container ID allocation failed: {reason}")]
    Allocation {
        reason: String,
        command: Option<IssuedCommand>,
    },
    #[error("cannot determine an IP address: {0}")]
    AddressResolution(String),
    #[error("malformed NETIF value in {}: '{line}': {source}", path.display())]
    Parse {
        path: PathBuf,
        line: String,
        source: vzprov_schema::NetifError,
    },
    #[error("cannot read network configuration from {}: {reason}", path.display())]
    Reconcile { path: PathBuf, reason: String },
    #[error("failed to write '{line}' to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        line: String,
        source: std::io::Error,
    },
    #[error("backend command `{}` exited with status {}: {}", .0.command, .0.status, .0.stderr.trim())]
    BackendCommand(IssuedCommand),
    #[error("interrupted before `{0}` was issued")]
    Interrupted(String),
    #[error("invalid provisioning transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// The backend command this error is about, if any.
    pub fn command(&self) -> Option<&IssuedCommand> {
        match self {
            CoreError::BackendCommand(cmd) => Some(cmd),
            CoreError::Allocation { command, .. } => command.as_ref(),
            _ => None,
        }
    }

    /// Errors raised before any container state was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::Allocation { .. }
                | CoreError::AddressResolution(_)
        )
    }
}

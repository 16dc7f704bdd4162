//! Execution layer for vzprov.
//!
//! Everything here talks to the host: the `CommandExecutor` trait with a
//! process-spawning implementation and a scripted mock, builders for the
//! `vzctl`/`vzlist` command lines, parsing of the container listing, forward
//! DNS lookups, and backend prerequisite checks.

pub mod executor;
pub mod lister;
pub mod mock;
pub mod prereq;
pub mod resolver;
pub mod vzctl;

pub use executor::{shell_quote, BackendCommand, CommandExecutor, CommandResult, ProcessExecutor};
pub use lister::{parse_listing, ListedContainer};
pub use mock::MockExecutor;
pub use prereq::{check_backend_prereqs, format_missing, MissingPrereq};
pub use resolver::{HostResolver, StaticResolver, SystemResolver};
pub use vzctl::VzCommands;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed container listing: {0}")]
    MalformedListing(String),
    #[error("host lookup for '{host}' failed: {source}")]
    Lookup {
        host: String,
        source: std::io::Error,
    },
}

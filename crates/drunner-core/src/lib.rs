//! Core orchestration for drunner service lifecycles.
//!
//! This crate ties the schema and runtime layers together into the
//! lifecycle controller (install, recreate, uninstall, obliterate,
//! recover), the volume provisioner, the hook protocol, and the backup
//! and restore engines. Every operation receives an explicit [`Context`]
//! — there is no process-global state — and returns either
//! [`OpResult::Success`], [`OpResult::NoChange`], or an error that the
//! caller turns into a fatal abort.

pub mod backup;
pub mod hooks;
pub mod lifecycle;
pub mod restore;
pub mod service;
pub mod settings;
pub mod tempfolder;
pub mod volumes;

pub use backup::backup;
pub use hooks::{service_cmd, ServiceHook};
pub use lifecycle::{install, obliterate, recover, uninstall, update};
pub use restore::restore;
pub use service::{installed_services, Service};
pub use settings::{Context, Settings};
pub use tempfolder::ScopedTempFolder;
pub use volumes::ensure_volumes;

use thiserror::Error;
use tracing::warn;

/// Outcome of a controller or engine operation that did not fail.
///
/// `NoChange` means nothing needed doing; it must never be conflated
/// with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Success,
    NoChange,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] drunner_schema::SchemaError),
    #[error("runtime error: {0}")]
    Runtime(#[from] drunner_runtime::RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid service name '{0}'")]
    InvalidName(String),
    #[error("service '{0}' already exists; try: drunner update {0}")]
    AlreadyInstalled(String),
    #[error("service '{0}' is not installed")]
    NotInstalled(String),
    #[error("image validation failed: {0}")]
    ValidationFailed(String),
    #[error("backup file {0} already exists")]
    DestinationExists(String),
    #[error("backup file {0} does not exist")]
    BackupMissing(String),
    #[error("backup corrupt: {0}")]
    CorruptArchive(String),
    #[error(
        "number of docker volumes changed: backup recorded {recorded}, \
         current image declares {current}"
    )]
    VolumeCountMismatch { recorded: usize, current: usize },
    #[error("temp folder {0} already exists")]
    TempFolderExists(String),
    #[error("internal inconsistency: {0}")]
    Internal(String),
}

/// The archive password, supplied out-of-band via `PASS`.
pub(crate) fn password_from_env() -> String {
    std::env::var("PASS").unwrap_or_else(|_| {
        warn!("PASS is not set; archives will be protected by an empty password");
        String::new()
    })
}

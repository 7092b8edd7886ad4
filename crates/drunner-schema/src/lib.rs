//! Record formats, manifests, and deterministic naming for drunner.
//!
//! This crate defines the data layer: the line-oriented shell-variable
//! codec (`bashvars`), the backup manifest sealed into every archive
//! (`BackupManifest`), the compose manifest handed over by the external
//! parser (`ComposeManifest`), the JSON service-vars snapshot
//! (`ServiceVars`), and the deterministic docker-volume naming scheme.

pub mod backupvars;
pub mod bashvars;
pub mod compose;
pub mod naming;
pub mod servicevars;

pub use backupvars::BackupManifest;
pub use bashvars::{BashRecord, FieldKind, FieldSpec};
pub use compose::{ComposeManifest, SubImage, VolumeBinding};
pub use naming::{alphanumeric_filter, volume_id};
pub use servicevars::ServiceVars;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("record I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("unknown key '{0}' for this record kind")]
    UnknownKey(String),
    #[error("missing required key '{0}'")]
    MissingKey(String),
    #[error("compose manifest not found at {0}")]
    ComposeNotFound(String),
    #[error("compose manifest unreadable: {0}")]
    ComposeUnreadable(#[from] serde_json::Error),
}

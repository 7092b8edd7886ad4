//! External-process collaborators for drunner.
//!
//! This crate implements the execution layer: the `ContainerRuntime` trait
//! over the docker CLI (image pulls, one-shot runs, named volumes, named
//! containers), the always-removed `EphemeralContainer` guard, and the
//! `Archiver` trait over the external compression/encryption tool, plus
//! in-memory mock implementations of both for tests.

pub mod archive;
pub mod cli;
pub mod container;
pub mod mock;
pub mod runtime;

pub use archive::{Archiver, CliArchiver};
pub use cli::DockerCli;
pub use container::{run_ephemeral, EphemeralContainer};
pub use mock::{MockArchiver, MockRuntime};
pub use runtime::{ContainerRuntime, Mount, PullStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to pull image '{image}': {detail}")]
    PullFailed { image: String, detail: String },
    #[error("container run failed: {0}")]
    ExecFailed(String),
    #[error("volume operation failed for '{volume}': {detail}")]
    VolumeFailed { volume: String, detail: String },
    #[error("archive operation failed: {0}")]
    ArchiveFailed(String),
    #[error("archive password rejected for {0}")]
    BadPassword(String),
}

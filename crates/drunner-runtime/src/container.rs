//! Ephemeral container lifetime guard.

use crate::runtime::{ContainerRuntime, Mount};
use crate::RuntimeError;
use tracing::warn;

/// A named container that is removed when the guard goes out of scope,
/// whatever the outcome of the run that used it.
pub struct EphemeralContainer<'a> {
    runtime: &'a dyn ContainerRuntime,
    name: String,
}

impl<'a> EphemeralContainer<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, name: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for EphemeralContainer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove_container(&self.name) {
            warn!("failed to remove container {}: {e}", self.name);
        }
    }
}

/// Run a named container to completion and remove it afterwards.
///
/// The guard is constructed before the run, so removal happens even when
/// the command inside the container fails; the failure is still returned,
/// just reported after cleanup.
pub fn run_ephemeral(
    runtime: &dyn ContainerRuntime,
    name: &str,
    image: &str,
    mounts: &[Mount],
    cmd: &[String],
) -> Result<(), RuntimeError> {
    let _guard = EphemeralContainer::new(runtime, name);
    runtime.run_named(name, image, mounts, cmd)
}

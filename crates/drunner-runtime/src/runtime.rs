use crate::RuntimeError;

/// A `-v source:target` mount. The source may be a host path or a named
/// docker volume; the runtime CLI treats both the same way.
pub type Mount = (String, String);

/// Outcome of an image pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// A newer image was downloaded.
    Pulled,
    /// The local image was already current.
    UpToDate,
    /// The image is tagged as a development branch and is never pulled.
    SkippedBranch,
}

/// The subset of the container-runtime CLI that drunner drives.
///
/// Every method is a blocking external-process invocation; there is no
/// internal parallelism and no timeout beyond what the process applies
/// to itself.
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn pull_image(&self, image: &str) -> Result<PullStatus, RuntimeError>;

    /// Run an image once with `--rm` and return its trimmed stdout.
    /// A non-zero exit is an error carrying the process's stderr.
    fn run_output(
        &self,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<String, RuntimeError>;

    /// Run an image once with `--rm`, streaming its output line-by-line to
    /// the logger as it is produced. A non-zero exit is an error.
    fn run_streaming(
        &self,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError>;

    /// Run a named, non-removed container to completion. The caller is
    /// responsible for removal — normally via [`crate::EphemeralContainer`].
    fn run_named(
        &self,
        name: &str,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError>;

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    fn list_containers(&self) -> Result<Vec<String>, RuntimeError>;

    fn create_volume(&self, name: &str) -> Result<(), RuntimeError>;

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;

    /// Exact-name lookup against the full volume listing. Substring
    /// probing would false-positive on volumes whose name contains
    /// another's, so membership is compared whole-name.
    fn volume_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.list_volumes()?.iter().any(|v| v == name))
    }

    fn list_volumes(&self) -> Result<Vec<String>, RuntimeError>;
}

/// `true` when the image tag marks a development branch build.
///
/// Branch images are built locally and must never be clobbered by a pull;
/// only untagged and `:master` images track the registry.
pub fn image_is_branch(image: &str) -> bool {
    match image.split_once(':') {
        Some((_, tag)) => !tag.eq_ignore_ascii_case("master"),
        None => false,
    }
}

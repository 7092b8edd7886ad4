//! In-memory runtime and archiver for tests.
//!
//! `MockRuntime` keeps volumes as real directories under a test root so
//! archive round-trips exercise genuine file content, and records every
//! operation in an event log shared with `MockArchiver` so tests can
//! assert ordering (e.g. hooks around archive writes). Failures can be
//! injected by marker substring to drive cleanup paths.

use crate::archive::Archiver;
use crate::runtime::{image_is_branch, ContainerRuntime, Mount, PullStatus};
use crate::RuntimeError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct MockImage {
    uid: u32,
    payload: Vec<(String, String)>,
}

#[derive(Default)]
struct MockState {
    images: HashMap<String, MockImage>,
    containers: Vec<String>,
    events: Vec<String>,
    fail_markers: Vec<String>,
}

#[derive(Clone)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
    root: PathBuf,
}

impl MockRuntime {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        fs::create_dir_all(root.join("volumes")).expect("mock volume root");
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            root,
        }
    }

    /// Register an image with its runtime uid and `/drunner` payload files
    /// (relative path, content). An empty payload models an image that is
    /// not lifecycle-compatible.
    pub fn register_image(&self, name: &str, uid: u32, payload: &[(&str, &str)]) {
        let mut state = self.state.lock().expect("mock state");
        state.images.insert(
            name.to_owned(),
            MockImage {
                uid,
                payload: payload
                    .iter()
                    .map(|(p, c)| ((*p).to_owned(), (*c).to_owned()))
                    .collect(),
            },
        );
    }

    /// Any subsequent operation whose event string contains `marker` fails.
    pub fn fail_when(&self, marker: &str) {
        let mut state = self.state.lock().expect("mock state");
        state.fail_markers.push(marker.to_owned());
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().expect("mock state").events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().expect("mock state").events.clear();
    }

    pub fn volume_dir(&self, name: &str) -> PathBuf {
        self.root.join("volumes").join(name)
    }

    /// An archiver sharing this runtime's volumes and event log.
    pub fn archiver(&self) -> MockArchiver {
        MockArchiver {
            state: Arc::clone(&self.state),
            volumes_dir: self.root.join("volumes"),
        }
    }

    fn record(&self, event: String) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("mock state");
        state.events.push(event.clone());
        if state.fail_markers.iter().any(|m| event.contains(m)) {
            return Err(RuntimeError::ExecFailed(format!(
                "injected failure: {event}"
            )));
        }
        Ok(())
    }

    fn image(&self, name: &str) -> Result<MockImage, RuntimeError> {
        self.state
            .lock()
            .expect("mock state")
            .images
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::ExecFailed(format!("unable to find image '{name}'")))
    }

    fn extract_payload(&self, image: &MockImage, dest: &Path) -> Result<(), RuntimeError> {
        for (rel, content) in &image.payload {
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }
        Ok(())
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn pull_image(&self, image: &str) -> Result<PullStatus, RuntimeError> {
        self.record(format!("pull:{image}"))?;
        if image_is_branch(image) {
            return Ok(PullStatus::SkippedBranch);
        }
        if self.state.lock().expect("mock state").images.contains_key(image) {
            Ok(PullStatus::Pulled)
        } else {
            Err(RuntimeError::PullFailed {
                image: image.to_owned(),
                detail: "not a registered mock image".to_owned(),
            })
        }
    }

    fn run_output(
        &self,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<String, RuntimeError> {
        let joined = cmd.join(" ");
        self.record(format!("run_output:{image}:{joined}"))?;
        let img = self.image(image)?;

        // Payload extraction: a mount at /tempcopy receives /drunner/*.
        if let Some((source, _)) = mounts.iter().find(|(_, t)| t == "/tempcopy") {
            self.extract_payload(&img, Path::new(source))?;
            return Ok(String::new());
        }
        // Image validation probes the payload before printing the uid.
        if joined.contains("test -d /drunner") {
            if img.payload.is_empty() {
                return Err(RuntimeError::ExecFailed(format!(
                    "{image}: /drunner payload missing"
                )));
            }
            return Ok(img.uid.to_string());
        }
        if joined.contains("id -u") {
            return Ok(img.uid.to_string());
        }
        Ok(String::new())
    }

    fn run_streaming(
        &self,
        image: &str,
        _mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError> {
        self.image(image)?;
        self.record(format!("run_streaming:{image}:{}", cmd.join(" ")))
    }

    fn run_named(
        &self,
        name: &str,
        image: &str,
        _mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError> {
        // A failed docker run still leaves the named container behind;
        // the mock mirrors that so guard tests mean something.
        {
            let mut state = self.state.lock().expect("mock state");
            state.containers.push(name.to_owned());
        }
        self.record(format!("run_named:{name}:{image}:{}", cmd.join(" ")))?;
        self.image(image)?;
        Ok(())
    }

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("remove_container:{name}"))?;
        let mut state = self.state.lock().expect("mock state");
        state.containers.retain(|c| c != name);
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.state.lock().expect("mock state").containers.clone())
    }

    fn create_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("create_volume:{name}"))?;
        fs::create_dir_all(self.volume_dir(name))?;
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("remove_volume:{name}"))?;
        let dir = self.volume_dir(name);
        if !dir.exists() {
            return Err(RuntimeError::VolumeFailed {
                volume: name.to_owned(),
                detail: "no such volume".to_owned(),
            });
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn list_volumes(&self) -> Result<Vec<String>, RuntimeError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root.join("volumes"))? {
            let entry = entry?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

const MOCK_HEADER_PREFIX: &str = "drunner-mock-archive:";

/// Archiver producing real (unencrypted) tar archives with a password
/// header, over the mock runtime's volume directories.
pub struct MockArchiver {
    state: Arc<Mutex<MockState>>,
    volumes_dir: PathBuf,
}

impl MockArchiver {
    fn record(&self, event: String) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("mock state");
        state.events.push(event.clone());
        if state.fail_markers.iter().any(|m| event.contains(m)) {
            return Err(RuntimeError::ArchiveFailed(format!(
                "injected failure: {event}"
            )));
        }
        Ok(())
    }

    fn write_archive(
        &self,
        password: &str,
        source: &Path,
        dest: &Path,
    ) -> Result<(), RuntimeError> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.append_dir_all(".", source)?;
        let tar_bytes = builder
            .into_inner()
            .map_err(|e| RuntimeError::ArchiveFailed(e.to_string()))?;

        let mut data = format!("{MOCK_HEADER_PREFIX}{password}\n").into_bytes();
        data.extend_from_slice(&tar_bytes);
        fs::write(dest, data)?;
        Ok(())
    }

    fn read_archive(
        &self,
        password: &str,
        archive: &Path,
        target: &Path,
    ) -> Result<(), RuntimeError> {
        if !archive.exists() {
            return Err(RuntimeError::ArchiveFailed(format!(
                "archive not found: {}",
                archive.display()
            )));
        }
        let data = fs::read(archive)?;
        let newline = data
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| RuntimeError::ArchiveFailed("truncated archive".to_owned()))?;
        let header = String::from_utf8_lossy(&data[..newline]);
        let stored = header.strip_prefix(MOCK_HEADER_PREFIX).ok_or_else(|| {
            RuntimeError::ArchiveFailed("not a mock archive".to_owned())
        })?;
        if stored != password {
            return Err(RuntimeError::BadPassword(archive.display().to_string()));
        }

        fs::create_dir_all(target)?;
        tar::Archive::new(&data[newline + 1..])
            .unpack(target)
            .map_err(|e| RuntimeError::ArchiveFailed(e.to_string()))?;
        Ok(())
    }

    fn volume_dir(&self, name: &str) -> Result<PathBuf, RuntimeError> {
        let dir = self.volumes_dir.join(name);
        if !dir.exists() {
            return Err(RuntimeError::VolumeFailed {
                volume: name.to_owned(),
                detail: "no such volume".to_owned(),
            });
        }
        Ok(dir)
    }
}

impl Archiver for MockArchiver {
    fn compress_folder(
        &self,
        password: &str,
        source_folder: &Path,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.record(format!("compress_folder:{archive_name}"))?;
        self.write_archive(password, source_folder, &dest_folder.join(archive_name))
    }

    fn compress_volume(
        &self,
        password: &str,
        volume: &str,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.record(format!("compress_volume:{volume}"))?;
        let dir = self.volume_dir(volume)?;
        self.write_archive(password, &dir, &dest_folder.join(archive_name))
    }

    fn decompress_folder(
        &self,
        password: &str,
        target_folder: &Path,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.record(format!("decompress_folder:{archive_name}"))?;
        self.read_archive(password, &archive_folder.join(archive_name), target_folder)
    }

    fn decompress_volume(
        &self,
        password: &str,
        target_volume: &str,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.record(format!("decompress_volume:{target_volume}"))?;
        let dir = self.volume_dir(target_volume)?;
        self.read_archive(password, &archive_folder.join(archive_name), &dir)
    }
}

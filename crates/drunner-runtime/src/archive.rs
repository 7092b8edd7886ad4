//! Password-protected archive operations.
//!
//! The archive format is a single encrypted, compressed container produced
//! by an external tool; drunner only names the subject, the destination
//! folder, and the archive file. `CliArchiver` pipes `tar` through `7z`
//! inside a one-shot container of the support image, so the host needs
//! nothing beyond the container runtime itself. The password travels
//! out-of-band in the `PASS` environment value.

use crate::RuntimeError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub trait Archiver: Send + Sync {
    /// Archive a host folder's full content as `dest_folder/archive_name`.
    fn compress_folder(
        &self,
        password: &str,
        source_folder: &Path,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError>;

    /// Archive a docker volume's full content as `dest_folder/archive_name`.
    fn compress_volume(
        &self,
        password: &str,
        volume: &str,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError>;

    /// Populate a host folder from `archive_folder/archive_name`.
    fn decompress_folder(
        &self,
        password: &str,
        target_folder: &Path,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError>;

    /// Populate a docker volume from `archive_folder/archive_name`.
    fn decompress_volume(
        &self,
        password: &str,
        target_volume: &str,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError>;
}

/// Archiver driving `tar | 7z` inside the support image.
pub struct CliArchiver {
    binary: String,
    support_image: String,
}

impl CliArchiver {
    pub fn new(support_image: impl Into<String>) -> Self {
        Self {
            binary: "docker".to_owned(),
            support_image: support_image.into(),
        }
    }

    /// Mount either a volume name or a host path at the given target and
    /// run a shell pipeline in the support image with PASS forwarded.
    fn run_piped(
        &self,
        password: &str,
        source: &str,
        target: &str,
        archive_folder: &Path,
        script: &str,
    ) -> Result<(), RuntimeError> {
        debug!("archive step in {}: {script}", self.support_image);
        let output = Command::new(&self.binary)
            .args([
                "run",
                "--rm",
                "-i",
                "-e",
                "PASS",
                "-v",
                &format!("{source}:{target}"),
                "-v",
                &format!("{}:/archive", archive_folder.display()),
                &self.support_image,
                "/bin/bash",
                "-c",
                script,
            ])
            .env("PASS", password)
            .output()?;
        if !output.status.success() {
            return Err(RuntimeError::ArchiveFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(())
    }
}

impl Archiver for CliArchiver {
    fn compress_folder(
        &self,
        password: &str,
        source_folder: &Path,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.run_piped(
            password,
            &source_folder.display().to_string(),
            "/src",
            dest_folder,
            &format!(
                "tar -C /src -cf - . | 7z a -si -mhe=on -p\"$PASS\" \"/archive/{archive_name}\" >/dev/null"
            ),
        )
    }

    fn compress_volume(
        &self,
        password: &str,
        volume: &str,
        dest_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.run_piped(
            password,
            volume,
            "/src",
            dest_folder,
            &format!(
                "tar -C /src -cf - . | 7z a -si -mhe=on -p\"$PASS\" \"/archive/{archive_name}\" >/dev/null"
            ),
        )
    }

    fn decompress_folder(
        &self,
        password: &str,
        target_folder: &Path,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(target_folder)?;
        self.run_piped(
            password,
            &target_folder.display().to_string(),
            "/dst",
            archive_folder,
            &format!("7z x -so -p\"$PASS\" \"/archive/{archive_name}\" | tar -C /dst -xf -"),
        )
    }

    fn decompress_volume(
        &self,
        password: &str,
        target_volume: &str,
        archive_folder: &Path,
        archive_name: &str,
    ) -> Result<(), RuntimeError> {
        self.run_piped(
            password,
            target_volume,
            "/dst",
            archive_folder,
            &format!("7z x -so -p\"$PASS\" \"/archive/{archive_name}\" | tar -C /dst -xf -"),
        )
    }
}

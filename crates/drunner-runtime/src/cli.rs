//! `ContainerRuntime` over the docker CLI.

use crate::runtime::{image_is_branch, ContainerRuntime, Mount, PullStatus};
use crate::RuntimeError;
use std::io::BufRead;
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default docker binary (e.g. a podman shim).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    fn run_args(mounts: &[Mount]) -> Vec<String> {
        let mut args = Vec::new();
        for (source, target) in mounts {
            args.push("-v".to_owned());
            args.push(format!("{source}:{target}"));
        }
        args
    }
}

impl ContainerRuntime for DockerCli {
    fn name(&self) -> &str {
        "docker"
    }

    fn pull_image(&self, image: &str) -> Result<PullStatus, RuntimeError> {
        if image_is_branch(image) {
            debug!("{image} is a development branch image, not pulling");
            return Ok(PullStatus::SkippedBranch);
        }

        debug!("pulling {image}");
        let output = self.command().args(["pull", image]).output()?;
        if !output.status.success() {
            return Err(RuntimeError::PullFailed {
                image: image.to_owned(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("Image is up to date") {
            Ok(PullStatus::UpToDate)
        } else {
            Ok(PullStatus::Pulled)
        }
    }

    fn run_output(
        &self,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<String, RuntimeError> {
        let mut args = vec!["run".to_owned(), "--rm".to_owned(), "-i".to_owned()];
        args.extend(Self::run_args(mounts));
        args.push(image.to_owned());
        args.extend(cmd.iter().cloned());

        let output = self.command().args(&args).output()?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "{image}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn run_streaming(
        &self,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError> {
        let mut args = vec!["run".to_owned(), "--rm".to_owned()];
        args.extend(Self::run_args(mounts));
        args.push(image.to_owned());
        args.extend(cmd.iter().cloned());

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Forward output as it is produced, not buffered until exit.
        if let Some(stdout) = child.stdout.take() {
            for line in std::io::BufReader::new(stdout).lines() {
                info!("{}", line?);
            }
        }
        let mut stderr_tail = String::new();
        if let Some(stderr) = child.stderr.take() {
            for line in std::io::BufReader::new(stderr).lines() {
                let line = line?;
                info!("{line}");
                stderr_tail = line;
            }
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::ExecFailed(format!(
                "{image} exited with code {}: {stderr_tail}",
                status.code().unwrap_or(1)
            )))
        }
    }

    fn run_named(
        &self,
        name: &str,
        image: &str,
        mounts: &[Mount],
        cmd: &[String],
    ) -> Result<(), RuntimeError> {
        let mut args = vec!["run".to_owned(), format!("--name={name}")];
        args.extend(Self::run_args(mounts));
        args.push(image.to_owned());
        args.extend(cmd.iter().cloned());

        let output = self.command().args(&args).output()?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "{image} ({name}): {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let output = self.command().args(["rm", "-f", name]).output()?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "docker rm {name}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
        let output = self
            .command()
            .args(["ps", "-a", "--format", "{{.Names}}"])
            .output()?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect())
    }

    fn create_volume(&self, name: &str) -> Result<(), RuntimeError> {
        let output = self
            .command()
            .args(["volume", "create", &format!("--name={name}")])
            .output()?;
        if !output.status.success() {
            return Err(RuntimeError::VolumeFailed {
                volume: name.to_owned(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        let output = self.command().args(["volume", "rm", name]).output()?;
        if !output.status.success() {
            return Err(RuntimeError::VolumeFailed {
                volume: name.to_owned(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(())
    }

    fn list_volumes(&self) -> Result<Vec<String>, RuntimeError> {
        let output = self
            .command()
            .args(["volume", "ls", "--format", "{{.Name}}"])
            .output()?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect())
    }
}

//! Process-wide parameters as an explicit value, not a global.

use crate::CoreError;
use drunner_runtime::{Archiver, ContainerRuntime};
use std::fs;
use std::path::{Path, PathBuf};

/// Default image used for root-privilege helper containers
/// (volume permission fix-up) and for the archive pipeline.
pub const DEFAULT_SUPPORT_IMAGE: &str = "drunner/rootutils";

/// Host-side directory layout and fixed parameters for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    root: PathBuf,
    bin_dir: PathBuf,
    host_ip: String,
    support_image: String,
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let bin_dir = root.join("bin");
        Self {
            root,
            bin_dir,
            host_ip: "127.0.0.1".to_owned(),
            support_image: DEFAULT_SUPPORT_IMAGE.to_owned(),
        }
    }

    pub fn with_host_ip(mut self, host_ip: impl Into<String>) -> Self {
        self.host_ip = host_ip.into();
        self
    }

    pub fn with_support_image(mut self, image: impl Into<String>) -> Self {
        self.support_image = image.into();
        self
    }

    /// Place launch scripts somewhere other than `<root>/bin`
    /// (typically the user's own bin directory).
    pub fn with_bin_dir(mut self, bin_dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = bin_dir.into();
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn services_dir(&self) -> PathBuf {
        self.root.join("services")
    }

    #[inline]
    pub fn hostvolumes_dir(&self) -> PathBuf {
        self.root.join("hostvolumes")
    }

    #[inline]
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    #[inline]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn host_ip(&self) -> &str {
        &self.host_ip
    }

    pub fn support_image(&self) -> &str {
        &self.support_image
    }

    pub fn initialize(&self) -> Result<(), CoreError> {
        fs::create_dir_all(self.services_dir())?;
        fs::create_dir_all(self.hostvolumes_dir())?;
        fs::create_dir_all(self.temp_dir())?;
        fs::create_dir_all(&self.bin_dir)?;
        Ok(())
    }
}

/// Everything an operation needs, constructed once and passed by
/// reference into every component.
pub struct Context {
    pub settings: Settings,
    pub runtime: Box<dyn ContainerRuntime>,
    pub archiver: Box<dyn Archiver>,
}

impl Context {
    pub fn new(
        settings: Settings,
        runtime: Box<dyn ContainerRuntime>,
        archiver: Box<dyn Archiver>,
    ) -> Self {
        Self {
            settings,
            runtime,
            archiver,
        }
    }
}

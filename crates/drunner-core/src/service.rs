//! Service identity and derived filesystem paths.

use crate::settings::Settings;
use crate::CoreError;
use drunner_schema::backupvars::VARIABLES_FILENAME;
use drunner_schema::{BackupManifest, ComposeManifest, ServiceVars};
use std::fs;
use std::path::PathBuf;

/// One installed (or to-be-installed) unit derived from a container image.
///
/// A service exists iff its root directory exists on disk; all other paths
/// are pure functions of the name and the settings. The lifecycle
/// controller owns the service exclusively for the duration of one
/// operation.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    image: String,
}

impl Service {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidName(name));
        }
        Ok(Self {
            name,
            image: image.into(),
        })
    }

    /// Load an installed service, recovering its image name from the
    /// vars snapshot (or the shell variables file as a fallback for
    /// services written by older versions).
    pub fn from_installed(settings: &Settings, name: &str) -> Result<Self, CoreError> {
        let probe = Self::new(name, String::new())?;
        if !probe.is_installed(settings) {
            return Err(CoreError::NotInstalled(name.to_owned()));
        }
        if let Ok(vars) = ServiceVars::load(probe.servicevars_path(settings)) {
            return Self::new(name, vars.image_name);
        }
        if let Ok(manifest) = BackupManifest::read_file(probe.variables_path(settings)) {
            return Self::new(name, manifest.image_name());
        }
        Err(CoreError::ValidationFailed(format!(
            "service '{name}' has no readable variables; try: drunner recover {name} <image>"
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    #[inline]
    pub fn root_dir(&self, settings: &Settings) -> PathBuf {
        settings.services_dir().join(&self.name)
    }

    /// The runtime payload copied out of the image (`/drunner/*`).
    #[inline]
    pub fn payload_dir(&self, settings: &Settings) -> PathBuf {
        self.root_dir(settings).join("drunner")
    }

    #[inline]
    pub fn hostvol_dir(&self, settings: &Settings) -> PathBuf {
        settings.hostvolumes_dir().join(&self.name)
    }

    #[inline]
    pub fn temp_dir(&self, settings: &Settings) -> PathBuf {
        settings.temp_dir().join(&self.name)
    }

    #[inline]
    pub fn launch_script(&self, settings: &Settings) -> PathBuf {
        settings.bin_dir().join(&self.name)
    }

    #[inline]
    pub fn variables_path(&self, settings: &Settings) -> PathBuf {
        self.root_dir(settings).join(VARIABLES_FILENAME)
    }

    #[inline]
    pub fn servicevars_path(&self, settings: &Settings) -> PathBuf {
        self.root_dir(settings).join("servicevars.json")
    }

    #[inline]
    pub fn compose_path(&self, settings: &Settings) -> PathBuf {
        self.payload_dir(settings).join("drunner-compose.json")
    }

    /// The well-known hook script delivered inside the image payload.
    #[inline]
    pub fn hook_script(&self, settings: &Settings) -> PathBuf {
        self.payload_dir(settings).join("servicerunner")
    }

    pub fn is_installed(&self, settings: &Settings) -> bool {
        self.root_dir(settings).exists()
    }

    /// Re-read the compose manifest from disk. Never cache the result
    /// across operations; an install can change the image.
    pub fn read_compose(&self, settings: &Settings) -> Result<ComposeManifest, CoreError> {
        Ok(ComposeManifest::read_file(self.compose_path(settings))?)
    }

    pub fn validate(&self, settings: &Settings) -> Result<(), CoreError> {
        let broken = |what: &str| {
            CoreError::ValidationFailed(format!(
                "{what} missing for '{}'; try: drunner recover {}",
                self.name, self.name
            ))
        };
        if !self.root_dir(settings).exists() {
            return Err(CoreError::NotInstalled(self.name.clone()));
        }
        if !self.payload_dir(settings).exists() {
            return Err(broken("runtime payload"));
        }
        if !self.launch_script(settings).exists() {
            return Err(broken("launch script"));
        }
        self.read_compose(settings)?;
        Ok(())
    }
}

/// Names of all services with a root directory on this host.
pub fn installed_services(settings: &Settings) -> Result<Vec<String>, CoreError> {
    let dir = settings.services_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

//! The backup manifest: a point-in-time snapshot of what a service's
//! archive contains, sealed into the archive at backup time and read back
//! at restore time as the sole source of truth.
//!
//! The same record kind is written as `variables.sh` into the service
//! directory at install time, so in-container scripts can source it.

use crate::bashvars::{BashRecord, FieldKind, FieldSpec};
use crate::compose::VolumeBinding;
use crate::SchemaError;
use std::path::Path;

/// File name inside a backup archive's working root.
pub const BACKUP_FILENAME: &str = "backupvars.sh";
/// File name inside an installed service's root directory.
pub const VARIABLES_FILENAME: &str = "variables.sh";

const SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        key: "SERVICENAME",
        kind: FieldKind::Scalar,
    },
    FieldSpec {
        key: "IMAGENAME",
        kind: FieldKind::Scalar,
    },
    FieldSpec {
        key: "INSTALLTIME",
        kind: FieldKind::Scalar,
    },
    FieldSpec {
        key: "HOSTIP",
        kind: FieldKind::Scalar,
    },
    FieldSpec {
        key: "SERVICETEMPDIR",
        kind: FieldKind::Scalar,
    },
    FieldSpec {
        key: "VOLUMES",
        kind: FieldKind::List,
    },
    FieldSpec {
        key: "DOCKERVOLS",
        kind: FieldKind::List,
    },
    FieldSpec {
        key: "DOCKEROPTS",
        kind: FieldKind::List,
    },
];

/// Immutable once written; construct via [`BackupManifest::build`].
#[derive(Debug, Clone)]
pub struct BackupManifest {
    record: BashRecord,
}

impl BackupManifest {
    /// Snapshot the given bindings. Mount options (`-v vol:path` pairs)
    /// are derived here so in-container scripts can splice them straight
    /// into a `docker run` invocation.
    pub fn build(
        service_name: &str,
        image_name: &str,
        host_ip: &str,
        service_temp_dir: &str,
        bindings: &[VolumeBinding],
    ) -> Self {
        let mut record = BashRecord::new(SCHEMA);
        let volumes: Vec<String> = bindings.iter().map(|b| b.logical_path.clone()).collect();
        let dockervols: Vec<String> = bindings.iter().map(|b| b.docker_volume.clone()).collect();
        let mut dockeropts = Vec::with_capacity(bindings.len() * 2);
        for b in bindings {
            dockeropts.push("-v".to_owned());
            dockeropts.push(format!("{}:{}", b.docker_volume, b.logical_path));
        }

        // The schema is fixed, so these writes cannot fail.
        let _ = record.set("SERVICENAME", service_name);
        let _ = record.set("IMAGENAME", image_name);
        let _ = record.set("INSTALLTIME", chrono::Utc::now().to_rfc3339());
        let _ = record.set("HOSTIP", host_ip);
        let _ = record.set("SERVICETEMPDIR", service_temp_dir);
        let _ = record.set_list("VOLUMES", volumes);
        let _ = record.set_list("DOCKERVOLS", dockervols);
        let _ = record.set_list("DOCKEROPTS", dockeropts);
        Self { record }
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let record = BashRecord::read_file(SCHEMA, path)?;
        if record.get("IMAGENAME").is_empty() {
            return Err(SchemaError::MissingKey("IMAGENAME".to_owned()));
        }
        Ok(Self { record })
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        self.record.write_file(path)
    }

    pub fn service_name(&self) -> &str {
        self.record.get("SERVICENAME")
    }

    pub fn image_name(&self) -> &str {
        self.record.get("IMAGENAME")
    }

    pub fn install_time(&self) -> &str {
        self.record.get("INSTALLTIME")
    }

    pub fn host_ip(&self) -> &str {
        self.record.get("HOSTIP")
    }

    pub fn volumes(&self) -> &[String] {
        self.record.get_list("VOLUMES")
    }

    pub fn docker_volumes(&self) -> &[String] {
        self.record.get_list("DOCKERVOLS")
    }

    pub fn docker_opts(&self) -> &[String] {
        self.record.get_list("DOCKEROPTS")
    }
}

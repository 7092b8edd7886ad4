//! Compose manifest: the declared shape of a service image.
//!
//! The manifest itself is produced by an external parser and handed over as
//! a flat JSON document inside the image payload; this module only reads
//! that hand-off format and derives volume bindings from it. Callers must
//! re-read it fresh whenever volume truth is needed — an install can change
//! the image, so a cached copy is never authoritative.

use crate::naming::volume_id;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A secondary image declared by the service, with its own volumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubImage {
    pub image: String,
    #[serde(default)]
    pub volumes: Vec<String>,
}

/// Declared volumes and sub-images for one service image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComposeManifest {
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub sub_images: Vec<SubImage>,
}

/// Pair of a logical in-container path and its derived docker volume,
/// tagged with the image whose runtime user owns the volume content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub logical_path: String,
    pub docker_volume: String,
    pub owner_image: String,
}

impl ComposeManifest {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchemaError::ComposeNotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// All volume bindings in declaration order: the primary image's
    /// volumes first, then each sub-image's in turn.
    pub fn volume_bindings(&self, service_name: &str, primary_image: &str) -> Vec<VolumeBinding> {
        let mut bindings = Vec::new();
        for path in &self.volumes {
            bindings.push(VolumeBinding {
                logical_path: path.clone(),
                docker_volume: volume_id(service_name, path),
                owner_image: primary_image.to_owned(),
            });
        }
        for sub in &self.sub_images {
            for path in &sub.volumes {
                bindings.push(VolumeBinding {
                    logical_path: path.clone(),
                    docker_volume: volume_id(service_name, path),
                    owner_image: sub.image.clone(),
                });
            }
        }
        bindings
    }

    /// Every distinct image the manifest declares beyond the primary.
    pub fn extra_images(&self, primary_image: &str) -> Vec<String> {
        let mut images = Vec::new();
        for sub in &self.sub_images {
            if sub.image != primary_image && !images.contains(&sub.image) {
                images.push(sub.image.clone());
            }
        }
        images
    }
}

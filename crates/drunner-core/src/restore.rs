//! The restore engine: rebuild a service from a backup archive.
//!
//! The archive's sealed manifest is the source of truth for the image and
//! the recorded volume set. The service is installed fresh from that
//! image, then each recorded volume archive is unpacked into the
//! corresponding newly created volume, pairing recorded and current
//! volumes by declaration order. A changed volume count means the image
//! has diverged too far to map data safely; the half-installed service is
//! removed again and the restore fails.

use crate::backup::{HOSTVOL_ARCHIVE, OUTER_ARCHIVE};
use crate::hooks::ServiceHook;
use crate::lifecycle::{install, uninstall};
use crate::service::Service;
use crate::settings::Context;
use crate::tempfolder::ScopedTempFolder;
use crate::{password_from_env, CoreError, OpResult};
use drunner_schema::backupvars::BACKUP_FILENAME;
use drunner_schema::BackupManifest;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub fn restore(ctx: &Context, name: &str, backup_file: &Path) -> Result<OpResult, CoreError> {
    if !backup_file.exists() {
        return Err(CoreError::BackupMissing(backup_file.display().to_string()));
    }
    let probe = Service::new(name, String::new())?;
    if probe.is_installed(&ctx.settings) {
        return Err(CoreError::AlreadyInstalled(name.to_owned()));
    }
    let password = password_from_env();

    let temp_root = ctx.settings.temp_dir();
    let work = ScopedTempFolder::create(temp_root.join(format!("restore-{name}")))?;
    let archive_folder = ScopedTempFolder::create(temp_root.join(format!("archivefolder-{name}")))?;

    // Unpack the outer archive into the working root.
    fs::copy(backup_file, archive_folder.path().join(OUTER_ARCHIVE))?;
    ctx.archiver
        .decompress_folder(&password, work.path(), archive_folder.path(), OUTER_ARCHIVE)?;

    let manifest = read_sealed_manifest(work.path())?;
    verify_members(work.path(), &manifest)?;

    // Everything the archive promises is present; now build the service.
    let image = manifest.image_name().to_owned();
    info!(service = name, image = %image, "restoring from backup");
    install(ctx, name, &image)?;

    let service = Service::from_installed(&ctx.settings, name)?;
    let compose = service.read_compose(&ctx.settings)?;
    let bindings = compose.volume_bindings(name, service.image());
    let recorded = manifest.docker_volumes();
    if recorded.len() != bindings.len() {
        warn!(
            recorded = recorded.len(),
            current = bindings.len(),
            "volume count changed since backup; removing half-restored service"
        );
        uninstall(ctx, name)?;
        return Err(CoreError::VolumeCountMismatch {
            recorded: recorded.len(),
            current: bindings.len(),
        });
    }

    let drbackup = work.path().join("drbackup");
    for (old_volume, binding) in recorded.iter().zip(&bindings) {
        if !ctx.runtime.volume_exists(&binding.docker_volume)? {
            return Err(CoreError::Internal(format!(
                "install did not create volume {}",
                binding.docker_volume
            )));
        }
        ctx.archiver.decompress_volume(
            &password,
            &binding.docker_volume,
            &drbackup,
            &format!("{old_volume}.tar.7z"),
        )?;
    }
    ctx.archiver.decompress_folder(
        &password,
        &service.hostvol_dir(&ctx.settings),
        &drbackup,
        HOSTVOL_ARCHIVE,
    )?;

    let scratch = work.path().join("containerbackup").display().to_string();
    ServiceHook::new(ctx, &service, "restore", &[&scratch]).end()?;

    info!(service = name, "restore complete");
    Ok(OpResult::Success)
}

fn read_sealed_manifest(work: &Path) -> Result<BackupManifest, CoreError> {
    let path = work.join(BACKUP_FILENAME);
    if !path.exists() {
        return Err(CoreError::CorruptArchive(format!(
            "{BACKUP_FILENAME} missing from archive"
        )));
    }
    BackupManifest::read_file(&path)
        .map_err(|e| CoreError::CorruptArchive(format!("{BACKUP_FILENAME} unreadable: {e}")))
}

/// Every member the manifest promises must exist before anything is
/// installed, so a truncated archive fails with the host untouched.
fn verify_members(work: &Path, manifest: &BackupManifest) -> Result<(), CoreError> {
    if !work.join("containerbackup").is_dir() {
        return Err(CoreError::CorruptArchive(
            "containerbackup folder missing from archive".to_owned(),
        ));
    }
    let drbackup = work.join("drbackup");
    for volume in manifest.docker_volumes() {
        let member = drbackup.join(format!("{volume}.tar.7z"));
        if !member.exists() {
            return Err(CoreError::CorruptArchive(format!(
                "volume archive {volume}.tar.7z missing"
            )));
        }
    }
    if !drbackup.join(HOSTVOL_ARCHIVE).exists() {
        return Err(CoreError::CorruptArchive(format!(
            "{HOSTVOL_ARCHIVE} missing"
        )));
    }
    Ok(())
}

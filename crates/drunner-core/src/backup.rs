//! The backup engine: one encrypted archive capturing everything a
//! restore needs.
//!
//! Layout inside the outer archive's working root:
//!   backupvars.sh                 manifest sealed at backup time
//!   drbackup/<volume>.tar.7z      one archive per docker volume
//!   drbackup/drunner_hostvol.tar.7z
//!   containerbackup/              scratch area filled by the service's
//!                                 own backup hooks

use crate::hooks::ServiceHook;
use crate::service::Service;
use crate::settings::Context;
use crate::tempfolder::ScopedTempFolder;
use crate::{password_from_env, CoreError, OpResult};
use drunner_schema::backupvars::BACKUP_FILENAME;
use drunner_schema::BackupManifest;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Name of the outer archive while staged in the archive folder.
pub const OUTER_ARCHIVE: &str = "backup.tar.7z";
/// Name of the host-volume-folder archive inside `drbackup/`.
pub const HOSTVOL_ARCHIVE: &str = "drunner_hostvol.tar.7z";

/// Subfolder of the working root holding the volume archives.
const DRBACKUP_DIR: &str = "drbackup";
/// Subfolder handed to the service's backup hooks.
const CONTAINER_BACKUP_DIR: &str = "containerbackup";

/// Back up `name` into `dest_file`. The destination must not exist; this
/// is checked before any temp folder is created or any hook runs, so a
/// mistyped path costs nothing.
pub fn backup(ctx: &Context, name: &str, dest_file: &Path) -> Result<OpResult, CoreError> {
    if dest_file.exists() {
        return Err(CoreError::DestinationExists(dest_file.display().to_string()));
    }
    let service = Service::from_installed(&ctx.settings, name)?;
    service.validate(&ctx.settings)?;
    let password = password_from_env();

    let temp_root = ctx.settings.temp_dir();
    let archive_folder = ScopedTempFolder::create(temp_root.join(format!("archivefolder-{name}")))?;
    let work = ScopedTempFolder::create(temp_root.join(format!("backup-{name}")))?;

    let drbackup = work.path().join(DRBACKUP_DIR);
    let containerbackup = work.path().join(CONTAINER_BACKUP_DIR);
    fs::create_dir_all(&drbackup)?;
    fs::create_dir_all(&containerbackup)?;
    // The backup hooks run as the image's own user; the scratch folder
    // must be writable by anyone.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&drbackup, fs::Permissions::from_mode(0o777))?;
        fs::set_permissions(&containerbackup, fs::Permissions::from_mode(0o777))?;
    }

    // Sealed manifest: the restore side trusts this over anything else.
    let manifest = service.read_compose(&ctx.settings)?;
    let bindings = manifest.volume_bindings(name, service.image());
    let vars = BackupManifest::build(
        name,
        service.image(),
        ctx.settings.host_ip(),
        &service.temp_dir(&ctx.settings).display().to_string(),
        &bindings,
    );
    vars.write_file(work.path().join(BACKUP_FILENAME))?;

    let scratch = containerbackup.display().to_string();
    let hook = ServiceHook::new(ctx, &service, "backup", &[&scratch]);
    hook.start()?;

    for binding in &bindings {
        if !ctx.runtime.volume_exists(&binding.docker_volume)? {
            warn!(volume = %binding.docker_volume, "volume missing; skipping");
            continue;
        }
        ctx.archiver.compress_volume(
            &password,
            &binding.docker_volume,
            &drbackup,
            &format!("{}.tar.7z", binding.docker_volume),
        )?;
    }
    ctx.archiver.compress_folder(
        &password,
        &service.hostvol_dir(&ctx.settings),
        &drbackup,
        HOSTVOL_ARCHIVE,
    )?;

    hook.end()?;

    ctx.archiver
        .compress_folder(&password, work.path(), archive_folder.path(), OUTER_ARCHIVE)?;
    let staged = archive_folder.path().join(OUTER_ARCHIVE);
    if !staged.exists() {
        return Err(CoreError::Internal(format!(
            "archiver reported success but {OUTER_ARCHIVE} was not produced"
        )));
    }
    move_file(&staged, dest_file)?;

    info!(service = name, dest = %dest_file.display(), "backup complete");
    Ok(OpResult::Success)
}

/// Rename, falling back to copy+unlink across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), CoreError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::install;
    use crate::testsupport::{test_context, APP_IMAGE};
    use drunner_runtime::ContainerRuntime;
    use drunner_schema::volume_id;

    #[test]
    fn backup_produces_single_archive_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.clear_events();

        let dest = dir.path().join("svc.backup");
        assert_eq!(backup(&ctx, "svc", &dest).unwrap(), OpResult::Success);
        assert!(dest.exists());

        // Temp folders unwound.
        assert!(!ctx.settings.temp_dir().join("backup-svc").exists());
        assert!(!ctx.settings.temp_dir().join("archivefolder-svc").exists());

        // Hooks bracket the archive writes.
        let events = rt.events();
        let start = events
            .iter()
            .position(|e| e.contains("backup_start"))
            .unwrap();
        let end = events.iter().position(|e| e.contains("backup_end")).unwrap();
        let first_vol = events
            .iter()
            .position(|e| e.starts_with("compress_volume:"))
            .unwrap();
        let hostvol = events
            .iter()
            .position(|e| e == &format!("compress_folder:{HOSTVOL_ARCHIVE}"))
            .unwrap();
        assert!(start < first_vol && first_vol < hostvol && hostvol < end);

        // Both declared volumes were archived.
        assert!(events.contains(&format!(
            "compress_volume:{}",
            volume_id("svc", "/config")
        )));
        assert!(events.contains(&format!(
            "compress_volume:{}",
            volume_id("svc", "/var/lib/mysql")
        )));
        // The outer archive was written last.
        let outer = events
            .iter()
            .position(|e| e == &format!("compress_folder:{OUTER_ARCHIVE}"))
            .unwrap();
        assert!(outer > end);
    }

    #[test]
    fn existing_destination_fails_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.clear_events();

        let dest = dir.path().join("svc.backup");
        fs::write(&dest, "precious").unwrap();

        let err = backup(&ctx, "svc", &dest).unwrap_err();
        assert!(matches!(err, CoreError::DestinationExists(_)));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "precious");
        // No hooks ran, no temp folders were created.
        assert!(rt.events().is_empty());
        assert!(!ctx.settings.temp_dir().join("backup-svc").exists());
    }

    #[test]
    fn missing_volume_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.remove_volume(&volume_id("svc", "/config")).unwrap();
        rt.clear_events();

        let dest = dir.path().join("svc.backup");
        assert_eq!(backup(&ctx, "svc", &dest).unwrap(), OpResult::Success);

        let events = rt.events();
        assert!(!events.contains(&format!(
            "compress_volume:{}",
            volume_id("svc", "/config")
        )));

        // Hooks still bracket the archive writes that do happen.
        let start = events
            .iter()
            .position(|e| e.contains("backup_start"))
            .unwrap();
        let end = events.iter().position(|e| e.contains("backup_end")).unwrap();
        let first_archive = events
            .iter()
            .position(|e| e.starts_with("compress_"))
            .unwrap();
        let last_inner = events
            .iter()
            .rposition(|e| e.starts_with("compress_") && !e.contains(OUTER_ARCHIVE))
            .unwrap();
        assert!(start < first_archive && last_inner < end);
    }

    #[test]
    fn temp_folders_unwind_on_archive_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.fail_when("compress_volume");

        let dest = dir.path().join("svc.backup");
        assert!(backup(&ctx, "svc", &dest).is_err());
        assert!(!dest.exists());
        assert!(!ctx.settings.temp_dir().join("backup-svc").exists());
        assert!(!ctx.settings.temp_dir().join("archivefolder-svc").exists());
    }

    #[test]
    fn stale_temp_folder_blocks_the_backup() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        fs::create_dir_all(ctx.settings.temp_dir().join("backup-svc")).unwrap();

        let dest = dir.path().join("svc.backup");
        let err = backup(&ctx, "svc", &dest).unwrap_err();
        assert!(matches!(err, CoreError::TempFolderExists(_)));
    }
}

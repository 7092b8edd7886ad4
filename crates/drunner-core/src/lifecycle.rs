//! The lifecycle controller: install, update, uninstall, obliterate,
//! recover.
//!
//! Install materialises a service from its image: payload copy, variables,
//! launch script, volumes. Uninstall removes host-side state but preserves
//! volumes; obliterate removes everything it can find, including volumes,
//! and succeeds on partial wreckage. All operations hold the service
//! exclusively for their duration — there is no cross-process locking, the
//! host operator serialises invocations.

use crate::hooks::ServiceHook;
use crate::service::Service;
use crate::settings::Context;
use crate::volumes::ensure_volumes;
use crate::{CoreError, OpResult};
use drunner_runtime::PullStatus;
use drunner_schema::{BackupManifest, ServiceVars};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Install a fresh service from an image. Fails if the name is taken.
pub fn install(ctx: &Context, name: &str, image: &str) -> Result<OpResult, CoreError> {
    let service = Service::new(name, image)?;
    if service.is_installed(&ctx.settings) {
        return Err(CoreError::AlreadyInstalled(name.to_owned()));
    }

    pull(ctx, image)?;
    validate_image(ctx, image)?;
    recreate(ctx, &service, false)?;
    ServiceHook::new(ctx, &service, "install", &[]).end()?;
    info!(service = name, image, "installed");
    Ok(OpResult::Success)
}

/// Re-pull the image and rebuild host-side state, preserving volumes.
pub fn update(ctx: &Context, name: &str) -> Result<OpResult, CoreError> {
    let service = Service::from_installed(&ctx.settings, name)?;
    let status = pull(ctx, service.image())?;
    validate_image(ctx, service.image())?;
    recreate(ctx, &service, true)?;
    ServiceHook::new(ctx, &service, "install", &[]).end()?;
    if status == PullStatus::UpToDate {
        info!(service = name, "image already current; state refreshed");
        return Ok(OpResult::NoChange);
    }
    info!(service = name, "updated");
    Ok(OpResult::Success)
}

/// Remove the service's host-side state. Docker volumes are deliberately
/// preserved so a later install of the same name picks the data back up.
pub fn uninstall(ctx: &Context, name: &str) -> Result<OpResult, CoreError> {
    let service = Service::from_installed(&ctx.settings, name)?;
    let hook = ServiceHook::new(ctx, &service, "uninstall", &[]);
    hook.start()?;

    remove_path(service.root_dir(&ctx.settings).as_path())?;
    remove_path(service.launch_script(&ctx.settings).as_path())?;

    hook.end()?;
    info!(service = name, "uninstalled (volumes preserved)");
    Ok(OpResult::Success)
}

/// Destroy every trace of the service: host state, launch script, host
/// volume folder, temp folder, and docker volumes. Volume removal is
/// best-effort; a vanished volume is not a failure.
pub fn obliterate(ctx: &Context, name: &str) -> Result<OpResult, CoreError> {
    match Service::from_installed(&ctx.settings, name) {
        Ok(service) => {
            let hook = ServiceHook::new(ctx, &service, "obliterate", &[]);
            hook.start()?;

            if let Ok(manifest) = service.read_compose(&ctx.settings) {
                for binding in manifest.volume_bindings(name, service.image()) {
                    if let Err(e) = ctx.runtime.remove_volume(&binding.docker_volume) {
                        warn!(volume = %binding.docker_volume, "could not remove volume: {e}");
                    }
                }
            } else {
                warn!(service = name, "compose manifest unreadable; volumes left behind");
            }

            // The end hook needs the payload still on disk, so it fires
            // before the file trees go.
            hook.end()?;
            remove_trash(ctx, &service)?;
            info!(service = name, "obliterated");
            Ok(OpResult::Success)
        }
        // Not properly installed: sweep up whatever fragments remain.
        Err(CoreError::NotInstalled(_)) | Err(CoreError::ValidationFailed(_)) => {
            let service = Service::new(name, String::new())?;
            let removed = remove_trash(ctx, &service)?;
            if removed {
                info!(service = name, "removed leftover state");
                Ok(OpResult::Success)
            } else {
                info!(service = name, "nothing to obliterate");
                Ok(OpResult::NoChange)
            }
        }
        Err(e) => Err(e),
    }
}

/// Uninstall (ignoring failures) then install: the repair path for a
/// service whose host state is broken. Volumes are never touched, so the
/// reinstall adopts the existing data. The image defaults to the one
/// recorded on disk.
pub fn recover(ctx: &Context, name: &str, image: Option<&str>) -> Result<OpResult, CoreError> {
    let image = match image {
        Some(image) => image.to_owned(),
        None => Service::from_installed(&ctx.settings, name)?.image().to_owned(),
    };
    if let Err(e) = uninstall(ctx, name) {
        // A broken install may not uninstall cleanly; clear the host
        // traces directly so the reinstall can proceed.
        debug!(service = name, "uninstall during recover failed: {e}");
        let service = Service::new(name, String::new())?;
        remove_path(service.root_dir(&ctx.settings).as_path())?;
        remove_path(service.launch_script(&ctx.settings).as_path())?;
    }
    install(ctx, name, &image)
}

/// Pull unless the tag marks a branch build.
fn pull(ctx: &Context, image: &str) -> Result<PullStatus, CoreError> {
    let status = ctx.runtime.pull_image(image)?;
    match status {
        PullStatus::Pulled => info!(image, "image pulled"),
        PullStatus::UpToDate => debug!(image, "image is up to date"),
        PullStatus::SkippedBranch => info!(image, "branch image; pull skipped"),
    }
    Ok(status)
}

/// An image is lifecycle-compatible when it carries a `/drunner` payload
/// and runs as a non-root user.
pub fn validate_image(ctx: &Context, image: &str) -> Result<(), CoreError> {
    let out = ctx.runtime.run_output(
        image,
        &[],
        &[
            "/bin/bash".to_owned(),
            "-c".to_owned(),
            "test -d /drunner && id -u | tr -d '\\r\\n'".to_owned(),
        ],
    );
    let out = out.map_err(|e| {
        CoreError::ValidationFailed(format!(
            "image '{image}' is not drunner-compatible (no /drunner payload?): {e}"
        ))
    })?;
    let uid: u32 = out.trim().parse().map_err(|_| {
        CoreError::ValidationFailed(format!("image '{image}' printed a non-numeric uid: {out}"))
    })?;
    if uid == 0 {
        return Err(CoreError::ValidationFailed(format!(
            "image '{image}' runs as root; service images must run unprivileged"
        )));
    }
    Ok(())
}

/// Build (or rebuild) host-side state. On any failure the service root is
/// removed again so a broken half-install never looks installed; volumes
/// that were already created are left for the next attempt to adopt.
fn recreate(ctx: &Context, service: &Service, updating: bool) -> Result<(), CoreError> {
    let result = build_service_state(ctx, service, updating);
    if let Err(e) = &result {
        warn!(service = service.name(), "install failed, rolling back: {e}");
        remove_path(service.root_dir(&ctx.settings).as_path())?;
        remove_path(service.launch_script(&ctx.settings).as_path())?;
    }
    result
}

fn build_service_state(ctx: &Context, service: &Service, updating: bool) -> Result<(), CoreError> {
    let settings = &ctx.settings;
    if updating {
        // A fresh root: stale files must not survive the rebuild.
        // Volumes are never touched here.
        remove_path(service.root_dir(settings).as_path())?;
    }
    fs::create_dir_all(service.payload_dir(settings))?;
    fs::create_dir_all(service.hostvol_dir(settings))?;
    fs::create_dir_all(service.temp_dir(settings))?;

    copy_payload(ctx, service)?;

    let manifest = service.read_compose(settings)?;
    for extra in manifest.extra_images(service.image()) {
        pull(ctx, &extra)?;
    }

    let bindings = manifest.volume_bindings(service.name(), service.image());
    let vars = BackupManifest::build(
        service.name(),
        service.image(),
        settings.host_ip(),
        &service.temp_dir(settings).display().to_string(),
        &bindings,
    );
    vars.write_file(service.variables_path(settings))?;
    ServiceVars::new(service.image()).save(service.servicevars_path(settings))?;

    write_launch_script(ctx, service)?;
    ensure_volumes(ctx, service.name(), service.image(), &manifest)?;
    Ok(())
}

/// Copy `/drunner/*` out of the image into the service's payload folder.
fn copy_payload(ctx: &Context, service: &Service) -> Result<(), CoreError> {
    let payload = service.payload_dir(&ctx.settings);
    ctx.runtime.run_output(
        service.image(),
        &[(payload.display().to_string(), "/tempcopy".to_owned())],
        &[
            "/bin/bash".to_owned(),
            "-c".to_owned(),
            "cp -r /drunner/* /tempcopy/ && chmod a+rx /tempcopy/*".to_owned(),
        ],
    )?;
    Ok(())
}

fn write_launch_script(ctx: &Context, service: &Service) -> Result<(), CoreError> {
    let path = service.launch_script(&ctx.settings);
    remove_path(path.as_path())?;
    fs::write(
        &path,
        format!("#!/bin/bash\ndrunner servicecmd {} \"$@\"\n", service.name()),
    )?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Remove every host-side remnant of a service; `true` if anything went.
fn remove_trash(ctx: &Context, service: &Service) -> Result<bool, CoreError> {
    let settings = &ctx.settings;
    let mut removed = false;
    for path in [
        service.root_dir(settings),
        service.hostvol_dir(settings),
        service.temp_dir(settings),
        service.launch_script(settings),
    ] {
        removed |= remove_path(path.as_path())?;
    }
    Ok(removed)
}

fn remove_path(path: &Path) -> Result<bool, CoreError> {
    if !path.exists() {
        return Ok(false);
    }
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{test_context, APP_IMAGE, DB_IMAGE};
    use drunner_schema::volume_id;

    #[test]
    fn install_materialises_full_state() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());

        assert_eq!(install(&ctx, "svc", APP_IMAGE).unwrap(), OpResult::Success);

        let svc = Service::from_installed(&ctx.settings, "svc").unwrap();
        assert_eq!(svc.image(), APP_IMAGE);
        assert!(svc.hook_script(&ctx.settings).exists());
        assert!(svc.compose_path(&ctx.settings).exists());
        assert!(svc.variables_path(&ctx.settings).exists());
        assert!(svc.hostvol_dir(&ctx.settings).is_dir());

        let launch = fs::read_to_string(svc.launch_script(&ctx.settings)).unwrap();
        assert_eq!(launch, "#!/bin/bash\ndrunner servicecmd svc \"$@\"\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(svc.launch_script(&ctx.settings))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }

        assert!(rt.volume_dir(&volume_id("svc", "/config")).is_dir());
        assert!(rt.volume_dir(&volume_id("svc", "/var/lib/mysql")).is_dir());

        let manifest = BackupManifest::read_file(svc.variables_path(&ctx.settings)).unwrap();
        assert_eq!(manifest.service_name(), "svc");
        assert_eq!(manifest.host_ip(), "10.0.0.1");
        assert_eq!(manifest.volumes(), ["/config", "/var/lib/mysql"]);

        // The sub-image was pulled; the install hook fired after the build.
        let events = rt.events();
        assert!(events.contains(&format!("pull:{DB_IMAGE}")));
        let hook_pos = events
            .iter()
            .position(|e| e.contains("install_end"))
            .unwrap();
        let vol_pos = events
            .iter()
            .rposition(|e| e.starts_with("create_volume:"))
            .unwrap();
        assert!(hook_pos > vol_pos);
    }

    #[test]
    fn install_refuses_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());

        install(&ctx, "svc", APP_IMAGE).unwrap();
        let err = install(&ctx, "svc", APP_IMAGE).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInstalled(_)));
    }

    #[test]
    fn install_rejects_incompatible_image() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());

        // The support image has no /drunner payload.
        let err = install(&ctx, "svc", "drunner/rootutils").unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)));
        assert!(!Service::new("svc", "").unwrap().is_installed(&ctx.settings));
    }

    #[test]
    fn failed_install_rolls_back_host_state() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        rt.fail_when("create_volume");

        assert!(install(&ctx, "svc", APP_IMAGE).is_err());
        let svc = Service::new("svc", "").unwrap();
        assert!(!svc.root_dir(&ctx.settings).exists());
        assert!(!svc.launch_script(&ctx.settings).exists());
    }

    #[test]
    fn uninstall_preserves_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();

        assert_eq!(uninstall(&ctx, "svc").unwrap(), OpResult::Success);

        let svc = Service::new("svc", "").unwrap();
        assert!(!svc.root_dir(&ctx.settings).exists());
        assert!(!svc.launch_script(&ctx.settings).exists());
        assert!(rt.volume_dir(&volume_id("svc", "/config")).is_dir());
    }

    #[test]
    fn uninstall_missing_service_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());
        assert!(matches!(
            uninstall(&ctx, "ghost").unwrap_err(),
            CoreError::NotInstalled(_)
        ));
    }

    #[test]
    fn obliterate_removes_volumes_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();

        assert_eq!(obliterate(&ctx, "svc").unwrap(), OpResult::Success);

        let svc = Service::new("svc", "").unwrap();
        assert!(!svc.root_dir(&ctx.settings).exists());
        assert!(!svc.hostvol_dir(&ctx.settings).exists());
        assert!(!rt.volume_dir(&volume_id("svc", "/config")).exists());
        assert!(!rt.volume_dir(&volume_id("svc", "/var/lib/mysql")).exists());
    }

    #[test]
    fn obliterate_fires_both_hooks_around_volume_removal() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.clear_events();

        obliterate(&ctx, "svc").unwrap();

        let events = rt.events();
        let start = events
            .iter()
            .position(|e| e.contains("obliterate_start"))
            .unwrap();
        let end = events
            .iter()
            .position(|e| e.contains("obliterate_end"))
            .unwrap();
        let first_removal = events
            .iter()
            .position(|e| e.starts_with("remove_volume:"))
            .unwrap();
        let last_removal = events
            .iter()
            .rposition(|e| e.starts_with("remove_volume:"))
            .unwrap();
        assert!(start < first_removal && last_removal < end);
    }

    #[test]
    fn obliterate_start_hook_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();
        rt.fail_when("obliterate_start");

        assert!(obliterate(&ctx, "svc").is_err());
        // Nothing was removed.
        let svc = Service::new("svc", "").unwrap();
        assert!(svc.root_dir(&ctx.settings).exists());
        assert!(rt.volume_dir(&volume_id("svc", "/config")).is_dir());
    }

    #[test]
    fn obliterate_sweeps_fragments_and_reports_no_change_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());

        // A stray launch script with no service directory.
        let svc = Service::new("svc", "").unwrap();
        fs::write(svc.launch_script(&ctx.settings), "#!/bin/bash\n").unwrap();

        assert_eq!(obliterate(&ctx, "svc").unwrap(), OpResult::Success);
        assert!(!svc.launch_script(&ctx.settings).exists());

        // Second pass finds nothing at all.
        assert_eq!(obliterate(&ctx, "svc").unwrap(), OpResult::NoChange);
    }

    #[test]
    fn update_refreshes_payload_and_keeps_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();

        let config_vol = volume_id("svc", "/config");
        fs::write(rt.volume_dir(&config_vol).join("keep"), "data").unwrap();
        let svc = Service::new("svc", "").unwrap();
        fs::write(svc.payload_dir(&ctx.settings).join("stale"), "old").unwrap();
        fs::write(svc.root_dir(&ctx.settings).join("stale-note"), "old").unwrap();
        rt.clear_events();

        // The mock always reports a successful pull.
        assert_eq!(update(&ctx, "svc").unwrap(), OpResult::Success);

        assert!(rt.volume_dir(&config_vol).join("keep").exists());
        // The whole root is rebuilt, not just the payload.
        assert!(!svc.payload_dir(&ctx.settings).join("stale").exists());
        assert!(!svc.root_dir(&ctx.settings).join("stale-note").exists());
        assert!(svc.hook_script(&ctx.settings).exists());
        assert!(svc.variables_path(&ctx.settings).exists());
        assert!(rt.events().iter().any(|e| e.contains("install_end")));
    }

    #[test]
    fn update_requires_installation() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());
        assert!(matches!(
            update(&ctx, "ghost").unwrap_err(),
            CoreError::NotInstalled(_)
        ));
    }

    #[test]
    fn recover_reinstalls_with_recorded_image() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());
        install(&ctx, "svc", APP_IMAGE).unwrap();

        // Break the installation.
        let svc = Service::new("svc", "").unwrap();
        fs::remove_file(svc.launch_script(&ctx.settings)).unwrap();

        assert_eq!(recover(&ctx, "svc", None).unwrap(), OpResult::Success);
        assert!(svc.launch_script(&ctx.settings).exists());
        Service::from_installed(&ctx.settings, "svc").unwrap();
    }

    #[test]
    fn recover_with_explicit_image_needs_no_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());

        assert_eq!(
            recover(&ctx, "svc", Some(APP_IMAGE)).unwrap(),
            OpResult::Success
        );
        Service::from_installed(&ctx.settings, "svc").unwrap();
    }
}

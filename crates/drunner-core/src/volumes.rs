//! Docker volume provisioning with ownership fix-up.

use crate::settings::Context;
use crate::CoreError;
use drunner_runtime::run_ephemeral;
use drunner_schema::{ComposeManifest, VolumeBinding};
use std::collections::HashMap;
use tracing::{debug, info};

/// Name of the short-lived container used to chown fresh volumes.
const VOLUME_MAKER: &str = "docker-volume-maker";

/// Create every volume the manifest declares for `service_name`, skipping
/// volumes that already exist so their data survives reinstalls. Freshly
/// created volumes are chowned to the runtime uid of the image that owns
/// them, via a root helper container.
pub fn ensure_volumes(
    ctx: &Context,
    service_name: &str,
    primary_image: &str,
    manifest: &ComposeManifest,
) -> Result<(), CoreError> {
    let bindings = manifest.volume_bindings(service_name, primary_image);
    if bindings.is_empty() {
        debug!(service = service_name, "no volumes declared");
        return Ok(());
    }

    let mut uids: HashMap<String, u32> = HashMap::new();
    for binding in &bindings {
        if ctx.runtime.volume_exists(&binding.docker_volume)? {
            info!(volume = %binding.docker_volume, "volume exists; reusing");
            continue;
        }
        let uid = owner_uid(ctx, &mut uids, &binding.owner_image)?;
        create_volume(ctx, binding, uid)?;
    }
    Ok(())
}

fn create_volume(ctx: &Context, binding: &VolumeBinding, uid: u32) -> Result<(), CoreError> {
    info!(volume = %binding.docker_volume, uid, "creating volume");
    ctx.runtime.create_volume(&binding.docker_volume)?;
    run_ephemeral(
        ctx.runtime.as_ref(),
        VOLUME_MAKER,
        ctx.settings.support_image(),
        &[(binding.docker_volume.clone(), "/tempmount".to_owned())],
        &[
            "chown".to_owned(),
            format!("{uid}:root"),
            "/tempmount".to_owned(),
        ],
    )?;
    Ok(())
}

/// Probe the runtime uid of an image, memoised per distinct owner image.
fn owner_uid(
    ctx: &Context,
    cache: &mut HashMap<String, u32>,
    image: &str,
) -> Result<u32, CoreError> {
    if let Some(uid) = cache.get(image) {
        return Ok(*uid);
    }
    let out = ctx.runtime.run_output(
        image,
        &[],
        &[
            "/bin/bash".to_owned(),
            "-c".to_owned(),
            "id -u | tr -d '\\r\\n'".to_owned(),
        ],
    )?;
    let uid: u32 = out.trim().parse().map_err(|_| {
        CoreError::Internal(format!("image '{image}' printed a non-numeric uid: {out}"))
    })?;
    // Root images are rejected by image validation before we ever get
    // here; seeing one now means a step was skipped.
    if uid == 0 {
        return Err(CoreError::Internal(format!(
            "image '{image}' runs as root and was not caught by validation"
        )));
    }
    cache.insert(image.to_owned(), uid);
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{test_context, APP_IMAGE, COMPOSE_JSON};
    use drunner_runtime::ContainerRuntime;
    use drunner_schema::volume_id;

    fn manifest() -> ComposeManifest {
        serde_json::from_str(COMPOSE_JSON).unwrap()
    }

    #[test]
    fn creates_and_chowns_fresh_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());

        ensure_volumes(&ctx, "svc", APP_IMAGE, &manifest()).unwrap();

        let config_vol = volume_id("svc", "/config");
        let db_vol = volume_id("svc", "/var/lib/mysql");
        assert!(rt.volume_dir(&config_vol).is_dir());
        assert!(rt.volume_dir(&db_vol).is_dir());

        let events = rt.events();
        // The app volume is chowned to 1000, the db volume to 999.
        assert!(events
            .iter()
            .any(|e| e.contains("run_named:docker-volume-maker") && e.contains("chown 1000:root")));
        assert!(events
            .iter()
            .any(|e| e.contains("run_named:docker-volume-maker") && e.contains("chown 999:root")));
        // The chown helper never lingers.
        assert!(rt.list_containers().unwrap().is_empty());
    }

    #[test]
    fn existing_volumes_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rt) = test_context(dir.path());

        let config_vol = volume_id("svc", "/config");
        rt.create_volume(&config_vol).unwrap();
        std::fs::write(rt.volume_dir(&config_vol).join("keep"), "data").unwrap();
        rt.clear_events();

        ensure_volumes(&ctx, "svc", APP_IMAGE, &manifest()).unwrap();

        assert!(rt.volume_dir(&config_vol).join("keep").exists());
        let creates: Vec<_> = rt
            .events()
            .into_iter()
            .filter(|e| e.starts_with("create_volume:"))
            .collect();
        assert_eq!(creates, [format!("create_volume:{}", volume_id("svc", "/var/lib/mysql"))]);
    }

    #[test]
    fn root_image_is_an_internal_inconsistency() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rt) = test_context(dir.path());

        let m: ComposeManifest = serde_json::from_str(r#"{"volumes": ["/data"]}"#).unwrap();
        let err = ensure_volumes(&ctx, "svc", "drunner/rootutils", &m).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }
}

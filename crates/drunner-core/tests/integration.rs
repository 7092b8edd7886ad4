//! Full lifecycle scenarios over the mock runtime: install, back up,
//! wipe, restore, and verify that data survives the round trip.

use drunner_core::{
    backup, install, installed_services, obliterate, restore, uninstall, Context, CoreError,
    OpResult, Service, Settings,
};
use drunner_runtime::MockRuntime;
use drunner_schema::volume_id;
use std::fs;
use std::path::Path;

const APP_IMAGE: &str = "drunner/minecraft";
const SUPPORT_IMAGE: &str = "drunner/rootutils";

const COMPOSE: &str = r#"{
    "volumes": ["/config", "/world"],
    "sub_images": []
}"#;

fn harness(root: &Path) -> (Context, MockRuntime) {
    let rt = MockRuntime::new(root.join("docker"));
    rt.register_image(
        APP_IMAGE,
        1000,
        &[
            ("servicerunner", "#!/bin/bash\necho hook $1\n"),
            ("drunner-compose.json", COMPOSE),
        ],
    );
    rt.register_image(SUPPORT_IMAGE, 0, &[]);

    let settings = Settings::new(root.join("drunner")).with_support_image(SUPPORT_IMAGE);
    settings.initialize().unwrap();
    let archiver = rt.archiver();
    let ctx = Context::new(settings, Box::new(rt.clone()), Box::new(archiver));
    (ctx, rt)
}

#[test]
fn install_backup_obliterate_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, rt) = harness(dir.path());

    install(&ctx, "mc", APP_IMAGE).unwrap();
    assert_eq!(installed_services(&ctx.settings).unwrap(), ["mc"]);

    // Put real data everywhere a backup must capture.
    let world_vol = volume_id("mc", "/world");
    let config_vol = volume_id("mc", "/config");
    fs::write(rt.volume_dir(&world_vol).join("level.dat"), "chunks").unwrap();
    fs::write(rt.volume_dir(&config_vol).join("server.properties"), "motd=hi").unwrap();
    let svc = Service::from_installed(&ctx.settings, "mc").unwrap();
    fs::write(svc.hostvol_dir(&ctx.settings).join("ops.json"), "[]").unwrap();

    let archive = dir.path().join("mc.backup");
    assert_eq!(backup(&ctx, "mc", &archive).unwrap(), OpResult::Success);

    assert_eq!(obliterate(&ctx, "mc").unwrap(), OpResult::Success);
    assert!(installed_services(&ctx.settings).unwrap().is_empty());
    assert!(!rt.volume_dir(&world_vol).exists());

    assert_eq!(restore(&ctx, "mc", &archive).unwrap(), OpResult::Success);

    assert_eq!(
        fs::read_to_string(rt.volume_dir(&world_vol).join("level.dat")).unwrap(),
        "chunks"
    );
    assert_eq!(
        fs::read_to_string(rt.volume_dir(&config_vol).join("server.properties")).unwrap(),
        "motd=hi"
    );
    assert_eq!(
        fs::read_to_string(svc.hostvol_dir(&ctx.settings).join("ops.json")).unwrap(),
        "[]"
    );
    assert_eq!(installed_services(&ctx.settings).unwrap(), ["mc"]);
}

#[test]
fn uninstall_then_reinstall_adopts_surviving_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, rt) = harness(dir.path());

    install(&ctx, "mc", APP_IMAGE).unwrap();
    let world_vol = volume_id("mc", "/world");
    fs::write(rt.volume_dir(&world_vol).join("level.dat"), "chunks").unwrap();

    uninstall(&ctx, "mc").unwrap();
    assert!(rt.volume_dir(&world_vol).exists());

    install(&ctx, "mc", APP_IMAGE).unwrap();
    assert_eq!(
        fs::read_to_string(rt.volume_dir(&world_vol).join("level.dat")).unwrap(),
        "chunks"
    );
}

#[test]
fn restore_leaves_host_untouched_when_archive_member_missing() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, rt) = harness(dir.path());

    install(&ctx, "mc", APP_IMAGE).unwrap();
    let archive = dir.path().join("mc.backup");
    backup(&ctx, "mc", &archive).unwrap();
    obliterate(&ctx, "mc").unwrap();

    // Truncate the archive so unpacking it fails outright.
    fs::write(&archive, "drunner-mock-archive:\n").unwrap();
    rt.clear_events();

    let err = restore(&ctx, "mc", &archive).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Runtime(_) | CoreError::CorruptArchive(_)
    ));
    assert!(installed_services(&ctx.settings).unwrap().is_empty());
    assert!(rt.events().iter().all(|e| !e.contains("install_end")));
}

#[test]
fn operations_on_unknown_service_fail_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _rt) = harness(dir.path());

    assert!(matches!(
        uninstall(&ctx, "ghost").unwrap_err(),
        CoreError::NotInstalled(_)
    ));
    assert!(matches!(
        backup(&ctx, "ghost", &dir.path().join("g.backup")).unwrap_err(),
        CoreError::NotInstalled(_)
    ));
    assert_eq!(obliterate(&ctx, "ghost").unwrap(), OpResult::NoChange);
}

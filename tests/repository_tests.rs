//! Tests for repository selection
//!
//! These tests verify:
//! - Local DVD definitions point at the mount and persist the mount once
//! - The embedded definition is the fallback and is never written alongside
//!   a local one
//! - Mount problems and write failures degrade instead of aborting

use std::fs;
use std::path::{Path, PathBuf};

use hostprep::command_runner::ScriptedRunner;
use hostprep::config::{HostPaths, ProvisionConfig};
use hostprep::facts::MediaLayout;
use hostprep::repo::{
    EMBEDDED_REPO_DEFINITION, EMBEDDED_REPO_FILE, LOCAL_REPO_FILE, RepositoryChoice,
    resolve_repository,
};

fn host() -> (tempfile::TempDir, HostPaths, ProvisionConfig) {
    let dir = tempfile::tempdir().unwrap();
    let paths = HostPaths::new(dir.path());
    let config = ProvisionConfig::default();
    fs::create_dir_all(paths.resolve("/etc")).unwrap();
    fs::write(
        paths.resolve(&config.paths.fstab),
        "UUID=1234 / xfs defaults 0 0\n",
    )
    .unwrap();
    (dir, paths, config)
}

fn add_device(paths: &HostPaths, device: &str) {
    let dev = paths.resolve(device);
    fs::create_dir_all(dev.parent().unwrap()).unwrap();
    fs::write(dev, b"").unwrap();
}

/// Runner whose `mount` populates the mount point with `subdirs`.
fn mounting_runner(subdirs: &'static [&'static str]) -> ScriptedRunner {
    let mut runner = ScriptedRunner::new();
    runner.fail("mountpoint -q").on("mount", move |inv| {
        let target = PathBuf::from(inv.args.last().unwrap());
        for sub in subdirs {
            fs::create_dir_all(target.join(sub)).unwrap();
        }
    });
    runner
}

fn repo_files(paths: &HostPaths, config: &ProvisionConfig) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(paths.resolve(&config.paths.repo_dir))
        .map(|rd| {
            rd.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// =============================================================================
// Local media
// =============================================================================

#[test]
fn test_split_media_gives_local_repo_only() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr0");
    let mut runner = mounting_runner(&["BaseOS", "AppStream"]);

    let resolution = resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr0")));

    assert!(resolution.is_local());
    assert!(matches!(
        resolution.choice,
        Some(RepositoryChoice::LocalDvd {
            layout: MediaLayout::Split,
            ..
        })
    ));
    assert_eq!(repo_files(&paths, &config), vec![LOCAL_REPO_FILE.to_string()]);
    assert_eq!(resolution.created_repo_files.len(), 1);

    let definition = fs::read_to_string(&resolution.created_repo_files[0]).unwrap();
    assert!(definition.contains("baseurl=file:///mnt/dvd/BaseOS"));
    assert!(definition.contains("baseurl=file:///mnt/dvd/AppStream"));
    assert!(!definition.contains("dl.rockylinux.org"));

    let mount_line = runner
        .command_lines()
        .into_iter()
        .find(|l| l.starts_with("mount -o ro"))
        .unwrap();
    assert!(mount_line.contains("/dev/sr0 "));
    assert!(mount_line.ends_with("/mnt/dvd"));
}

#[test]
fn test_fstab_entry_is_appended_once() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr1");
    let fstab = paths.resolve(&config.paths.fstab);

    for _ in 0..2 {
        let mut runner = mounting_runner(&["BaseOS"]);
        resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr1")));
    }

    let content = fs::read_to_string(fstab).unwrap();
    assert!(content.starts_with("UUID=1234 / xfs defaults 0 0\n"));
    assert_eq!(
        content
            .lines()
            .filter(|l| *l == "/dev/sr1 /mnt/dvd iso9660 ro,defaults 0 0")
            .count(),
        1
    );
}

#[test]
fn test_flat_media_single_section() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr0");
    let mut runner = mounting_runner(&["Packages"]);

    let resolution = resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr0")));
    let definition = fs::read_to_string(&resolution.created_repo_files[0]).unwrap();
    assert!(definition.starts_with("[dvd]\n"));
    assert!(definition.contains("baseurl=file:///mnt/dvd\n"));
}

#[test]
fn test_already_mounted_skips_mount() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr0");
    fs::create_dir_all(paths.resolve("/mnt/dvd/BaseOS")).unwrap();
    let mut runner = ScriptedRunner::new();
    runner.succeed("mountpoint -q", "");

    let resolution = resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr0")));
    assert!(resolution.is_local());
    assert_eq!(runner.count("mount"), 0);
    assert_eq!(runner.count("mountpoint"), 1);
}

// =============================================================================
// Embedded fallback
// =============================================================================

#[test]
fn test_no_device_writes_embedded_definition() {
    let (_dir, paths, config) = host();
    let fstab_before = fs::read(paths.resolve(&config.paths.fstab)).unwrap();
    let mut runner = ScriptedRunner::new();

    let resolution = resolve_repository(&mut runner, &paths, &config, None);

    assert_eq!(repo_files(&paths, &config), vec![EMBEDDED_REPO_FILE.to_string()]);
    let written = fs::read_to_string(&resolution.created_repo_files[0]).unwrap();
    assert_eq!(written, EMBEDDED_REPO_DEFINITION);

    let sections: Vec<&str> = written.lines().filter(|l| l.starts_with('[')).collect();
    assert_eq!(sections, vec!["[AppStream]", "[BaseOS]"]);
    assert_eq!(written.matches("gpgcheck=0").count(), 2);

    assert!(runner.calls().is_empty());
    assert_eq!(fs::read(paths.resolve(&config.paths.fstab)).unwrap(), fstab_before);
}

#[test]
fn test_mount_failure_falls_back() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr0");
    let mut runner = ScriptedRunner::new();
    runner.fail("mountpoint -q").fail("mount");

    let resolution = resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr0")));
    assert!(matches!(
        resolution.choice,
        Some(RepositoryChoice::EmbeddedRemote { .. })
    ));
    assert_eq!(repo_files(&paths, &config), vec![EMBEDDED_REPO_FILE.to_string()]);
}

#[test]
fn test_non_install_media_falls_back_without_fstab() {
    let (_dir, paths, config) = host();
    add_device(&paths, "/dev/sr0");
    let fstab_before = fs::read(paths.resolve(&config.paths.fstab)).unwrap();
    let mut runner = mounting_runner(&["music"]);

    let resolution = resolve_repository(&mut runner, &paths, &config, Some(Path::new("/dev/sr0")));
    assert!(!resolution.is_local());
    assert_eq!(repo_files(&paths, &config), vec![EMBEDDED_REPO_FILE.to_string()]);
    assert_eq!(fs::read(paths.resolve(&config.paths.fstab)).unwrap(), fstab_before);
}

#[test]
fn test_repeated_runs_keep_one_definition_style() {
    let (_dir, paths, config) = host();
    for _ in 0..3 {
        let mut runner = ScriptedRunner::new();
        let resolution = resolve_repository(&mut runner, &paths, &config, None);
        assert_eq!(resolution.created_repo_files.len(), 1);
    }
    assert_eq!(repo_files(&paths, &config), vec![EMBEDDED_REPO_FILE.to_string()]);
}

#[test]
fn test_unwritable_repo_dir_degrades_to_none() {
    let (_dir, paths, config) = host();
    let repo_dir = paths.resolve(&config.paths.repo_dir);
    // a regular file where the directory should be
    fs::write(&repo_dir, b"").unwrap();

    let mut runner = ScriptedRunner::new();
    let resolution = resolve_repository(&mut runner, &paths, &config, None);
    assert!(!resolution.is_configured());
    assert!(resolution.created_repo_files.is_empty());
}

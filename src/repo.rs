//! Package repository selection.
//!
//! Chooses exactly one repository source for the run and writes its
//! definition:
//!
//! 1. Optical media that mounts and looks like an install tree gives a local
//!    `file://` repository (and a persistent fstab entry).
//! 2. Anything else gives the embedded remote-mirror definition.
//!
//! # Failure Policy
//!
//! Nothing in here aborts the run. A failed mount is treated as "no device";
//! a failed write degrades to "no repository configured" and later package
//! operations are left to fail on their own.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command_runner::{CommandRunner, succeeds};
use crate::commands::system::{MountPointCheck, MountReadOnly};
use crate::config::{HostPaths, ProvisionConfig};
use crate::error::Result;
use crate::facts::{MediaLayout, probe_media_layout};

/// File name of the local DVD repository definition.
pub const LOCAL_REPO_FILE: &str = "hostprep-dvd.repo";
/// File name of the embedded remote repository definition.
pub const EMBEDDED_REPO_FILE: &str = "hostprep-remote.repo";

/// Remote mirror definition used when no usable media is present.
///
/// Signature checking is disabled on purpose; the lab mirrors are unsigned.
pub const EMBEDDED_REPO_DEFINITION: &str = "\
[AppStream]
name=AppStream
baseurl=https://dl.rockylinux.org/pub/rocky/9/AppStream/x86_64/os/
enabled=1
gpgcheck=0

[BaseOS]
name=BaseOS
baseurl=https://dl.rockylinux.org/pub/rocky/9/BaseOS/x86_64/os/
enabled=1
gpgcheck=0
";

/// The single repository source chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryChoice {
    /// Mounted installation media
    LocalDvd { mount: PathBuf, layout: MediaLayout },
    /// Embedded remote mirrors
    EmbeddedRemote { definition: String },
}

impl fmt::Display for RepositoryChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalDvd { mount, layout } => {
                write!(f, "local DVD at {} ({})", mount.display(), layout)
            }
            Self::EmbeddedRemote { .. } => write!(f, "embedded remote mirrors"),
        }
    }
}

/// Outcome of repository resolution, handed on to cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryResolution {
    /// `None` when resolution degraded to "no repository configured".
    pub choice: Option<RepositoryChoice>,
    /// Every repo file written by this run, in write order.
    pub created_repo_files: Vec<PathBuf>,
}

impl RepositoryResolution {
    pub fn is_local(&self) -> bool {
        matches!(self.choice, Some(RepositoryChoice::LocalDvd { .. }))
    }

    pub fn is_configured(&self) -> bool {
        self.choice.is_some()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Choose, write and record the repository source for this run.
///
/// `optical_device` is the host path reported by the fact prober.
pub fn resolve_repository(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    optical_device: Option<&Path>,
) -> RepositoryResolution {
    let repo_dir = paths.resolve(&config.paths.repo_dir);

    if let Some(device) = optical_device {
        let mount = paths.resolve(&config.paths.dvd_mount);
        if ensure_mounted(runner, paths, device, &mount) {
            if let Some(layout) = probe_media_layout(&mount) {
                tracing::info!("Install media detected at {} ({})", mount.display(), layout);
                let repo_file = repo_dir.join(LOCAL_REPO_FILE);
                let definition = render_local_definition(&config.paths.dvd_mount, &mount, layout);

                return match write_repo_file(&repo_file, &definition) {
                    Ok(()) => {
                        if let Err(e) = persist_mount(paths, config, device) {
                            tracing::warn!("Could not persist DVD mount in fstab: {}", e);
                        }
                        RepositoryResolution {
                            choice: Some(RepositoryChoice::LocalDvd { mount, layout }),
                            created_repo_files: vec![repo_file],
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to write {}: {} (no repository configured)",
                            repo_file.display(),
                            e
                        );
                        RepositoryResolution::default()
                    }
                };
            }
            tracing::info!(
                "{} is mounted but does not look like install media",
                mount.display()
            );
        }
    } else {
        tracing::info!("No optical device found");
    }

    let repo_file = repo_dir.join(EMBEDDED_REPO_FILE);
    match write_repo_file(&repo_file, EMBEDDED_REPO_DEFINITION) {
        Ok(()) => {
            tracing::info!("Embedded repository written to {}", repo_file.display());
            RepositoryResolution {
                choice: Some(RepositoryChoice::EmbeddedRemote {
                    definition: EMBEDDED_REPO_DEFINITION.to_string(),
                }),
                created_repo_files: vec![repo_file],
            }
        }
        Err(e) => {
            tracing::warn!(
                "Failed to write {}: {} (no repository configured)",
                repo_file.display(),
                e
            );
            RepositoryResolution::default()
        }
    }
}

/// Mount `device` read-only at `mount` unless something is already there.
///
/// Returns false on any failure; the caller treats that as "no device".
fn ensure_mounted(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    device: &Path,
    mount: &Path,
) -> bool {
    if let Err(e) = fs::create_dir_all(mount) {
        tracing::warn!("Cannot create mount point {}: {}", mount.display(), e);
        return false;
    }

    if succeeds(runner, &MountPointCheck { path: mount.to_path_buf() }) {
        tracing::info!("{} already mounted, skipping mount", mount.display());
        return true;
    }

    let mounted = succeeds(
        runner,
        &MountReadOnly {
            device: paths.resolve(device),
            path: mount.to_path_buf(),
        },
    );
    if !mounted {
        tracing::warn!(
            "Mounting {} failed, falling back to embedded repository",
            device.display()
        );
    }
    mounted
}

/// Local repository sections; base URLs use the host mount path.
pub fn render_local_definition(host_mount: &str, mount: &Path, layout: MediaLayout) -> String {
    let host_mount = host_mount.trim_end_matches('/');
    match layout {
        MediaLayout::Split => ["BaseOS", "AppStream"]
            .iter()
            .filter(|sub| mount.join(sub).is_dir())
            .map(|sub| {
                format!(
                    "[dvd-{sub}]\nname=DVD {sub}\nbaseurl=file://{host_mount}/{sub}\nenabled=1\ngpgcheck=0\n"
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        MediaLayout::Flat => format!(
            "[dvd]\nname=DVD\nbaseurl=file://{host_mount}\nenabled=1\ngpgcheck=0\n"
        ),
    }
}

fn write_repo_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::write(path, contents) {
        // Never leave a half-written definition behind unrecorded.
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}

/// Append an fstab entry for the DVD unless one already targets the mount.
fn persist_mount(paths: &HostPaths, config: &ProvisionConfig, device: &Path) -> Result<()> {
    let fstab = paths.resolve(&config.paths.fstab);
    let existing = match fs::read_to_string(&fstab) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if fstab_has_mount(&existing, &config.paths.dvd_mount) {
        tracing::debug!("fstab already mounts {}", config.paths.dvd_mount);
        return Ok(());
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!(
        "{} {} iso9660 ro,defaults 0 0\n",
        device.display(),
        config.paths.dvd_mount
    ));
    fs::write(&fstab, updated)?;
    tracing::info!("Persisted {} in {}", config.paths.dvd_mount, fstab.display());
    Ok(())
}

/// True if a non-comment fstab line mounts at `mount_point`.
pub fn fstab_has_mount(fstab: &str, mount_point: &str) -> bool {
    fstab
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split_whitespace().nth(1) == Some(mount_point))
}

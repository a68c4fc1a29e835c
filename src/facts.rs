//! Host environment detection
//!
//! Detects the facts every later decision depends on: hostname, optical
//! media, desktop presence, installed packages.
//!
//! # Design
//!
//! - **Read-only**: probes never mutate the host and are safe to repeat
//! - **Absence is an answer**: a missing device, package or binary yields
//!   `None`/`false`, never an error
//! - **Cheapest first**: the GUI probe asks systemd before querying rpm

use std::fmt;
use std::path::{Path, PathBuf};

use crate::command_runner::{CommandRunner, run_command, succeeds};
use crate::commands::dnf::RpmQuery;
use crate::commands::system::HostnameQuery;
use crate::commands::systemctl::GetDefaultTarget;
use crate::config::{HostPaths, ProvisionConfig};

/// Top-level directories that mark split (BaseOS/AppStream) media.
const SPLIT_TREE_DIRS: &[&str] = &["BaseOS", "AppStream"];
/// Directory that marks flat media.
const FLAT_TREE_DIR: &str = "Packages";
/// Tree-info marker written by the compose tooling.
const TREEINFO: &str = ".treeinfo";

/// Layout of mounted installation media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaLayout {
    /// `BaseOS/` and/or `AppStream/` repositories on the media
    Split,
    /// A single repository at the media root (`Packages/` or `.treeinfo` only)
    Flat,
}

impl fmt::Display for MediaLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split => write!(f, "split (BaseOS/AppStream)"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Facts gathered once at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub current_hostname: String,
    pub desired_hostname: String,
    pub optical_device: Option<PathBuf>,
    /// Set once repository resolution has inspected the mounted media.
    pub media_looks_like_install_tree: bool,
    pub gui_present: bool,
}

impl HostFacts {
    /// Probe everything that does not require mounting media.
    pub fn probe(
        runner: &mut dyn CommandRunner,
        paths: &HostPaths,
        config: &ProvisionConfig,
    ) -> Self {
        let current_hostname = probe_hostname(runner);
        let optical_device = probe_optical_device(paths, config);
        let gui_present = probe_gui_present(runner, config);

        tracing::info!(
            "Host facts: hostname={:?} desired={:?} optical={:?} gui={}",
            current_hostname,
            config.hostname,
            optical_device,
            gui_present
        );

        Self {
            current_hostname,
            desired_hostname: config.hostname.clone(),
            optical_device,
            media_looks_like_install_tree: false,
            gui_present,
        }
    }

    /// True if the hostname step has work to do.
    pub fn hostname_differs(&self) -> bool {
        self.current_hostname != self.desired_hostname
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Fully-qualified hostname if obtainable, else the short form.
///
/// Returns an empty string if neither query works.
pub fn probe_hostname(runner: &mut dyn CommandRunner) -> String {
    for fqdn in [true, false] {
        if let Ok(output) = run_command(runner, &HostnameQuery { fqdn }) {
            let name = output.stdout.trim();
            if output.success && !name.is_empty() {
                return name.to_string();
            }
        }
    }
    tracing::warn!("Could not determine current hostname");
    String::new()
}

/// First configured optical device that exists (sr1 before sr0 by default).
///
/// Returns the host path of the device, not the root-resolved one.
pub fn probe_optical_device(paths: &HostPaths, config: &ProvisionConfig) -> Option<PathBuf> {
    config
        .paths
        .optical_devices
        .iter()
        .find(|dev| paths.resolve(dev.as_str()).exists())
        .map(PathBuf::from)
}

/// Classify mounted media, or `None` if it is not an install tree.
pub fn probe_media_layout(mount: &Path) -> Option<MediaLayout> {
    if SPLIT_TREE_DIRS.iter().any(|d| mount.join(d).is_dir()) {
        Some(MediaLayout::Split)
    } else if mount.join(FLAT_TREE_DIR).is_dir() || mount.join(TREEINFO).is_file() {
        Some(MediaLayout::Flat)
    } else {
        None
    }
}

/// True if the mount exposes distribution directories or a tree-info file.
pub fn probe_media_is_install_tree(mount: &Path) -> bool {
    probe_media_layout(mount).is_some()
}

/// True if the default target is graphical, or a desktop session or X
/// server package is installed.
pub fn probe_gui_present(runner: &mut dyn CommandRunner, config: &ProvisionConfig) -> bool {
    let default_is_graphical = run_command(runner, &GetDefaultTarget)
        .map(|o| o.success && o.stdout.trim() == config.graphical_target)
        .unwrap_or(false);

    default_is_graphical
        || probe_package_installed(runner, &config.gui_session_package)
        || probe_package_installed(runner, &config.x_server_package)
}

/// `rpm -q` succeeded for `name`.
pub fn probe_package_installed(runner: &mut dyn CommandRunner, name: &str) -> bool {
    succeeds(
        runner,
        &RpmQuery {
            package: name.to_string(),
        },
    )
}

//! Teardown
//!
//! Runs after provisioning no matter how the steps went. Removes only the
//! repository files this run created, resets transient state and removes the
//! executable. `request_reboot` is kept separate so the caller can log the
//! run summary before the host goes down.
//!
//! # Failure Policy
//!
//! Every action is attempted; failures are collected as warnings. The reboot
//! is fire-and-forget and is always the last action taken.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::command_runner::{CommandRunner, run_checked, run_command};
use crate::commands::dnf::{DnfCleanAll, DnfRemove};
use crate::commands::systemctl::{Reboot, SetDefaultTarget};
use crate::config::{HostPaths, ProvisionConfig};
use crate::repo::RepositoryResolution;
use crate::report::StepOutcome;

/// Teardown switches decided at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    pub reboot: bool,
    /// Executable to delete; `None` disables self-removal.
    pub self_path: Option<PathBuf>,
    pub reboot_delay: Duration,
}

impl CleanupOptions {
    /// Options from configuration, locating the running executable.
    pub fn from_config(config: &ProvisionConfig, no_reboot: bool) -> Self {
        let self_path = if config.remove_self && !no_reboot {
            match std::env::current_exe() {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Cannot locate own executable, it will be kept: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            reboot: config.reboot && !no_reboot,
            self_path,
            reboot_delay: Duration::from_secs(config.reboot_delay_secs),
        }
    }

    /// Keep the host running and the executable in place.
    pub fn disabled() -> Self {
        Self {
            reboot: false,
            self_path: None,
            reboot_delay: Duration::ZERO,
        }
    }
}

/// What teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub removed_repo_files: Vec<PathBuf>,
    pub cache_cleaned: bool,
    pub self_removed: bool,
    /// A reboot follows once the summary is logged.
    pub reboot_pending: bool,
    pub reboot_requested: bool,
    pub warnings: Vec<String>,
}

impl CleanupSummary {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn to_outcome(&self) -> StepOutcome {
        let detail = format!(
            "{} repo file(s) removed, reboot {}",
            self.removed_repo_files.len(),
            if self.reboot_pending { "pending" } else { "skipped" }
        );
        if self.warnings.is_empty() {
            StepOutcome::success(detail)
        } else {
            StepOutcome::failed(format!("{}; {}", detail, self.warnings.join("; ")))
        }
    }
}

/// Tear down the run.
pub fn run_cleanup(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    repository: &RepositoryResolution,
    options: &CleanupOptions,
) -> CleanupSummary {
    let mut summary = CleanupSummary::default();

    for file in &repository.created_repo_files {
        match fs::remove_file(file) {
            Ok(()) => {
                tracing::info!("Removed {}", file.display());
                summary.removed_repo_files.push(file.clone());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("{} already gone", file.display());
            }
            Err(e) => summary.warn(format!("Could not remove {}: {}", file.display(), e)),
        }
    }

    if !summary.removed_repo_files.is_empty() {
        match run_checked(runner, &DnfCleanAll) {
            Ok(_) => summary.cache_cleaned = true,
            Err(e) => summary.warn(format!("Cache clean failed: {}", e)),
        }
    }

    // Second removal of the legacy package; absence makes dnf fail, which is fine.
    if let Err(e) = run_checked(
        runner,
        &DnfRemove {
            package: config.legacy_package.clone(),
        },
    ) {
        tracing::info!("Final removal of {}: {}", config.legacy_package, e);
    }

    if let Err(e) = run_checked(
        runner,
        &SetDefaultTarget {
            target: config.text_target.clone(),
        },
    ) {
        summary.warn(format!("Could not set default target: {}", e));
    }

    if let Err(e) = clear_history(&paths.resolve(&config.paths.shell_history)) {
        summary.warn(format!("Could not clear shell history: {}", e));
    }

    let work_dir = paths.resolve(&config.paths.docs_work_dir);
    match fs::remove_dir_all(&work_dir) {
        Ok(()) => tracing::debug!("Removed {}", work_dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => summary.warn(format!("Could not remove {}: {}", work_dir.display(), e)),
    }

    if let Some(self_path) = &options.self_path {
        match fs::remove_file(self_path) {
            Ok(()) => {
                tracing::info!("Removed {}", self_path.display());
                summary.self_removed = true;
            }
            Err(e) => summary.warn(format!("Could not remove {}: {}", self_path.display(), e)),
        }
    }

    summary.reboot_pending = options.reboot;
    summary
}

/// Sleep for the configured delay, then ask the service manager to reboot.
///
/// Returns whether a reboot was requested. Nothing should run after this.
pub fn request_reboot(runner: &mut dyn CommandRunner, options: &CleanupOptions) -> bool {
    if !options.reboot {
        return false;
    }
    tracing::info!("Rebooting in {}s", options.reboot_delay.as_secs());
    thread::sleep(options.reboot_delay);
    if let Err(e) = run_command(runner, &Reboot) {
        tracing::warn!("Reboot request failed: {}", e);
    }
    true
}

/// Truncate the history file; a missing file is already clear.
fn clear_history(path: &Path) -> std::io::Result<()> {
    match fs::OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => {
            tracing::info!("Cleared {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::ScriptedRunner;

    #[test]
    fn test_nothing_created_means_no_cache_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ScriptedRunner::new();
        let summary = run_cleanup(
            &mut runner,
            &HostPaths::new(dir.path()),
            &ProvisionConfig::default(),
            &RepositoryResolution::default(),
            &CleanupOptions::disabled(),
        );
        assert!(!runner.called("dnf clean"));
        assert_eq!(runner.count("dnf remove -y cockpit"), 1);
        assert_eq!(runner.count("systemctl set-default multi-user.target"), 1);
        assert!(!runner.called("systemctl reboot"));
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn test_history_truncated_and_self_removed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = HostPaths::new(dir.path());
        let config = ProvisionConfig::default();
        let history = paths.resolve(&config.paths.shell_history);
        fs::create_dir_all(history.parent().unwrap()).unwrap();
        fs::write(&history, "dnf install -y httpd\n").unwrap();
        let exe = dir.path().join("hostprep");
        fs::write(&exe, b"\x7fELF").unwrap();

        let options = CleanupOptions {
            reboot: true,
            self_path: Some(exe.clone()),
            reboot_delay: Duration::ZERO,
        };
        let mut runner = ScriptedRunner::new();
        let summary = run_cleanup(
            &mut runner,
            &paths,
            &config,
            &RepositoryResolution::default(),
            &options,
        );

        assert_eq!(fs::metadata(&history).unwrap().len(), 0);
        assert!(!exe.exists());
        assert!(summary.self_removed);
        assert!(summary.reboot_pending);
        assert!(!runner.called("systemctl reboot"));

        assert!(request_reboot(&mut runner, &options));
        assert_eq!(runner.command_lines().last().map(String::as_str), Some("systemctl reboot"));
    }

    #[test]
    fn test_reboot_skipped_when_disabled() {
        let mut runner = ScriptedRunner::new();
        assert!(!request_reboot(&mut runner, &CleanupOptions::disabled()));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_disabled_from_no_reboot_flag() {
        let options = CleanupOptions::from_config(&ProvisionConfig::default(), true);
        assert!(!options.reboot);
        assert!(options.self_path.is_none());
    }
}

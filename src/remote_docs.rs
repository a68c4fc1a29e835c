//! Remote documentation fetch
//!
//! Pulls lab manual pages from a remote repository and installs the helper
//! scripts alongside them.
//!
//! # Failure Policy
//!
//! An unreachable remote skips the whole step: no clone, no manual pages, no
//! helper scripts, one log line. Nothing is retried. A clone or copy failure
//! after a successful probe fails the step, but the work directory is still
//! removed.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::command_runner::{CommandRunner, run_checked, succeeds};
use crate::commands::git::{GitLsRemote, GitShallowClone};
use crate::commands::system::MandbRefresh;
use crate::config::{HelperScript, HostPaths, ProvisionConfig};
use crate::error::Result;
use crate::facts::probe_package_installed;
use crate::plan::ensure_packages_installed;
use crate::report::StepOutcome;

/// Mode applied to every helper script.
const HELPER_MODE: u32 = 0o755;

/// What a fetch left on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsFetch {
    /// Clone succeeded and content was installed.
    Fetched {
        man_pages: Vec<PathBuf>,
        helpers: Vec<PathBuf>,
    },
    /// Remote did not answer the probe.
    Unreachable,
    /// Client missing and installs are disabled for this run.
    NoClient,
}

/// True for first-section manual pages (`name.1` or `name.1.gz`).
pub fn is_section_one_page(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(".1") || name.ends_with(".1.gz"))
}

/// Fetch documentation and install helper scripts.
pub fn fetch_remote_docs(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    installs_allowed: bool,
) -> Result<DocsFetch> {
    if !probe_package_installed(runner, &config.vcs_package) {
        if !installs_allowed {
            tracing::info!(
                "{} not installed and installs are disabled, skipping docs fetch",
                config.vcs_package
            );
            return Ok(DocsFetch::NoClient);
        }
        ensure_packages_installed(runner, std::iter::once(&config.vcs_package))?;
    }

    let reachable = succeeds(
        runner,
        &GitLsRemote {
            url: config.docs_repo_url.clone(),
        },
    );
    if !reachable {
        tracing::info!(
            "Documentation repository {} unreachable, skipping",
            config.docs_repo_url
        );
        return Ok(DocsFetch::Unreachable);
    }

    let work_dir = paths.resolve(&config.paths.docs_work_dir);
    remove_dir_if_present(&work_dir)?;

    let installed = clone_and_install(runner, paths, config, &work_dir);
    if let Err(e) = remove_dir_if_present(&work_dir) {
        tracing::warn!("Could not remove {}: {}", work_dir.display(), e);
    }
    installed
}

fn clone_and_install(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    work_dir: &Path,
) -> Result<DocsFetch> {
    run_checked(
        runner,
        &GitShallowClone {
            url: config.docs_repo_url.clone(),
            dest: work_dir.to_path_buf(),
        },
    )?;

    let man_dir = paths.resolve(&config.paths.man_dir);
    let man_pages = copy_man_pages(work_dir, &man_dir)?;
    tracing::info!("Installed {} manual page(s) into {}", man_pages.len(), man_dir.display());

    if let Err(e) = run_checked(runner, &MandbRefresh) {
        tracing::warn!("Manual page index refresh failed: {}", e);
    }

    let bin_dir = paths.resolve(&config.paths.bin_dir);
    let helpers = install_helpers(&bin_dir, &config.helper_scripts)?;

    Ok(DocsFetch::Fetched { man_pages, helpers })
}

/// Copy every section-one page under `source` (outside `.git`) into `man_dir`.
fn copy_man_pages(source: &Path, man_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(man_dir)?;

    let mut copied = Vec::new();
    let walker = WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() || !is_section_one_page(entry.path()) {
            continue;
        }
        let dest = man_dir.join(entry.file_name());
        fs::copy(entry.path(), &dest)?;
        copied.push(dest);
    }
    Ok(copied)
}

/// Write each helper into `bin_dir` with mode 0755.
pub fn install_helpers(bin_dir: &Path, helpers: &[HelperScript]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(bin_dir)?;

    let mut written = Vec::with_capacity(helpers.len());
    for helper in helpers {
        let path = bin_dir.join(&helper.name);
        fs::write(&path, &helper.body)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(HELPER_MODE))?;
        tracing::info!("Installed helper {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Step 9 wrapper mapping the fetch result onto a step outcome.
pub fn fetch_step(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    installs_allowed: bool,
) -> Result<StepOutcome> {
    Ok(match fetch_remote_docs(runner, paths, config, installs_allowed)? {
        DocsFetch::Fetched { man_pages, helpers } => StepOutcome::success(format!(
            "{} manual page(s), {} helper script(s)",
            man_pages.len(),
            helpers.len()
        )),
        DocsFetch::Unreachable => {
            StepOutcome::skipped(format!("{} unreachable", config.docs_repo_url))
        }
        DocsFetch::NoClient => StepOutcome::skipped(format!(
            "{} missing and installs disabled",
            config.vcs_package
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::ScriptedRunner;

    #[test]
    fn test_section_one_detection() {
        assert!(is_section_one_page(Path::new("docs/lab.1")));
        assert!(is_section_one_page(Path::new("lab-status.1.gz")));
        assert!(!is_section_one_page(Path::new("lab.8")));
        assert!(!is_section_one_page(Path::new("lab.10")));
        assert!(!is_section_one_page(Path::new("README.md")));
    }

    #[test]
    fn test_helpers_are_executable() {
        let dir = tempfile::tempdir().unwrap();
        let helpers = ProvisionConfig::default().helper_scripts;
        let written = install_helpers(dir.path(), &helpers).unwrap();
        assert_eq!(written.len(), 2);
        for path in written {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_no_client_on_gui_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ScriptedRunner::new();
        runner.fail("rpm -q git");

        let result = fetch_remote_docs(
            &mut runner,
            &HostPaths::new(dir.path()),
            &ProvisionConfig::default(),
            false,
        )
        .unwrap();
        assert_eq!(result, DocsFetch::NoClient);
        assert!(!runner.called("dnf"));
        assert!(!runner.called("git"));
    }

    #[test]
    fn test_clone_failure_cleans_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = HostPaths::new(dir.path());
        let config = ProvisionConfig::default();
        let work_dir = paths.resolve(&config.paths.docs_work_dir);
        fs::create_dir_all(work_dir.join("stale")).unwrap();

        let mut runner = ScriptedRunner::new();
        runner.fail("git clone");
        assert!(fetch_remote_docs(&mut runner, &paths, &config, true).is_err());
        assert!(!work_dir.exists());
        assert!(!paths.resolve("/usr/local/bin/lab-docs").exists());
    }
}

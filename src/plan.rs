//! Package decisions for a run
//!
//! `PackagePlan` is derived once from `HostFacts`. On GUI hosts nothing is
//! installed at all: no metadata refresh, no required packages, no desktop
//! group. Everywhere else only packages that are genuinely absent are ever
//! handed to the package manager.

use std::collections::BTreeSet;

use crate::command_runner::{CommandRunner, run_checked, run_command};
use crate::commands::dnf::{DnfGroupInstall, DnfGroupList, DnfInstall, DnfMakecache, DnfRemove};
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::facts::{HostFacts, probe_package_installed};
use crate::report::StepOutcome;

/// What to remove and install this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    pub to_remove: BTreeSet<String>,
    /// Candidates only; each is queried before install.
    pub to_install_if_missing: BTreeSet<String>,
    pub install_gui_group: bool,
    /// False on GUI hosts; gates every install, including the VCS client.
    pub installs_allowed: bool,
}

impl PackagePlan {
    pub fn from_facts(facts: &HostFacts, config: &ProvisionConfig) -> Self {
        let installs_allowed = !facts.gui_present;
        let to_install_if_missing = if installs_allowed {
            config.required_packages.iter().cloned().collect()
        } else {
            BTreeSet::new()
        };

        Self {
            to_remove: BTreeSet::from([config.legacy_package.clone()]),
            to_install_if_missing,
            install_gui_group: installs_allowed,
            installs_allowed,
        }
    }
}

// ============================================================================
// Package operations
// ============================================================================

/// Packages from `candidates` that `rpm -q` reports as absent.
pub fn missing_packages<'a>(
    runner: &mut dyn CommandRunner,
    candidates: impl IntoIterator<Item = &'a String>,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|pkg| !probe_package_installed(runner, pkg))
        .cloned()
        .collect()
}

/// Install whichever of `candidates` are missing.
///
/// Metadata is refreshed first, best effort. Returns the packages that were
/// requested; an empty list means the package manager was never invoked.
pub fn ensure_packages_installed<'a>(
    runner: &mut dyn CommandRunner,
    candidates: impl IntoIterator<Item = &'a String>,
) -> Result<Vec<String>> {
    let missing = missing_packages(runner, candidates);
    if missing.is_empty() {
        tracing::debug!("All requested packages already installed");
        return Ok(missing);
    }

    match run_command(runner, &DnfMakecache) {
        Ok(output) if output.success => {}
        Ok(output) => tracing::warn!(
            "Metadata refresh failed, attempting install anyway: {}",
            output.stderr.trim()
        ),
        Err(e) => tracing::warn!("Metadata refresh failed, attempting install anyway: {}", e),
    }

    run_checked(
        runner,
        &DnfInstall {
            packages: missing.clone(),
        },
    )?;
    Ok(missing)
}

/// `dnf remove -y <pkg>` if installed; absence is not an error.
pub fn remove_if_installed(runner: &mut dyn CommandRunner, package: &str) -> Result<StepOutcome> {
    if !probe_package_installed(runner, package) {
        return Ok(StepOutcome::skipped(format!("{} not installed", package)));
    }
    run_checked(
        runner,
        &DnfRemove {
            package: package.to_string(),
        },
    )?;
    Ok(StepOutcome::success(format!("removed {}", package)))
}

// ============================================================================
// Steps
// ============================================================================

/// Step 2: remove every package the plan marks for removal.
pub fn remove_packages(runner: &mut dyn CommandRunner, plan: &PackagePlan) -> Result<StepOutcome> {
    let mut removed = Vec::new();
    for package in &plan.to_remove {
        if remove_if_installed(runner, package)?.is_success() {
            removed.push(package.as_str());
        }
    }
    if removed.is_empty() {
        Ok(StepOutcome::skipped("nothing to remove"))
    } else {
        Ok(StepOutcome::success(format!("removed {}", removed.join(" "))))
    }
}

/// Step 3: install required packages unless the host has a desktop.
pub fn install_required(runner: &mut dyn CommandRunner, plan: &PackagePlan) -> Result<StepOutcome> {
    if !plan.installs_allowed {
        return Ok(StepOutcome::skipped("GUI present, package installation disabled"));
    }

    let installed = ensure_packages_installed(runner, &plan.to_install_if_missing)?;
    if installed.is_empty() {
        Ok(StepOutcome::skipped("all required packages already installed"))
    } else {
        Ok(StepOutcome::success(format!("installed {}", installed.join(" "))))
    }
}

/// True if `dnf group list --available` lists `group` as a whole line.
pub fn group_offered(runner: &mut dyn CommandRunner, group: &str) -> bool {
    match run_command(runner, &DnfGroupList) {
        Ok(output) if output.success => output
            .stdout
            .lines()
            .any(|line| line.trim() == group),
        Ok(_) => false,
        Err(e) => {
            tracing::debug!("{}", e);
            false
        }
    }
}

/// Step 8: install the desktop group if the repositories offer it.
pub fn install_desktop_group(
    runner: &mut dyn CommandRunner,
    plan: &PackagePlan,
    group: &str,
) -> Result<StepOutcome> {
    if !plan.install_gui_group {
        return Ok(StepOutcome::skipped("GUI already present"));
    }
    if !group_offered(runner, group) {
        return Ok(StepOutcome::skipped(format!(
            "group '{}' not offered by configured repositories",
            group
        )));
    }

    run_checked(
        runner,
        &DnfGroupInstall {
            group: group.to_string(),
        },
    )?;
    Ok(StepOutcome::success(format!("installed group '{}'", group)))
}

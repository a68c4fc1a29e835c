//! Pre-flight sanity checks for the runtime environment
//!
//! This module checks the host before provisioning starts:
//! - Required runtime binaries are present
//! - Running with root privileges (EUID 0)
//!
//! Unlike an installer, provisioning never refuses to start: problems are
//! logged as warnings and the affected steps fail on their own.

use crate::command_runner::{CommandRunner, succeeds};
use crate::commands::system::Which;

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Binaries the provisioning steps invoke directly
pub const REQUIRED_BINARIES: &[&str] = &[
    "dnf",         // Package transactions and groups
    "rpm",         // Installed-package queries
    "systemctl",   // Services and default target
    "hostnamectl", // Hostname
    "mount",       // Optical media
    "useradd",     // Account creation
    "chpasswd",    // Password reset
];

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Check every required binary through `runner`.
pub fn verify_environment(runner: &mut dyn CommandRunner) -> SanityCheckResult {
    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|binary| {
            !succeeds(
                runner,
                &Which {
                    binary: (**binary).to_string(),
                },
            )
        })
        .map(|b| (*b).to_string())
        .collect();

    SanityCheckResult {
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

/// Log the outcome of the checks as warnings.
pub fn report_findings(result: &SanityCheckResult) {
    if !result.is_root {
        tracing::warn!("Not running as root: most provisioning steps will fail");
    }
    if !result.missing_binaries.is_empty() {
        tracing::warn!(
            "Missing binaries: {} (dependent steps will fail)",
            result.missing_binaries.join(", ")
        );
    }
    if result.is_ok() {
        tracing::info!("Pre-flight checks passed: root, all binaries present");
    }
}

/// Main entry point: verify environment and log, never abort.
pub fn run_preflight_checks(runner: &mut dyn CommandRunner) -> SanityCheckResult {
    tracing::debug!("Running pre-flight sanity checks...");
    let result = verify_environment(runner);
    report_findings(&result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::ScriptedRunner;

    #[test]
    fn test_sanity_check_result_is_ok() {
        let result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
        };
        assert!(result.is_ok());
    }

    #[test]
    fn test_sanity_check_result_not_root() {
        let result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: false,
        };
        assert!(!result.is_ok());
    }

    #[test]
    fn test_missing_binaries_are_reported() {
        let mut runner = ScriptedRunner::new();
        runner.fail("which dnf").fail("which chpasswd");

        let result = verify_environment(&mut runner);
        assert_eq!(result.missing_binaries, vec!["dnf", "chpasswd"]);
        assert_eq!(runner.count("which"), REQUIRED_BINARIES.len());
    }
}

//! Type-safe commands for the package manager.
//!
//! - `RpmQuery` for `rpm -q <pkg>`
//! - `DnfInstall` / `DnfRemove` for package transactions
//! - `DnfMakecache` for metadata refresh
//! - `DnfGroupList` / `DnfGroupInstall` for package groups
//! - `DnfCleanAll` for cache cleanup

use crate::command_traits::SystemCommand;

// ============================================================================
// Queries
// ============================================================================

/// `rpm -q <package>`: exits 0 iff the package is installed.
#[derive(Debug, Clone)]
pub struct RpmQuery {
    pub package: String,
}

impl SystemCommand for RpmQuery {
    fn program(&self) -> &'static str {
        "rpm"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-q".to_string(), self.package.clone()]
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `dnf group list --available`: lists groups the configured repos offer.
#[derive(Debug, Clone)]
pub struct DnfGroupList;

impl SystemCommand for DnfGroupList {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "group".to_string(),
            "list".to_string(),
            "--available".to_string(),
        ]
    }

    fn is_query(&self) -> bool {
        true
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// `dnf install -y <packages..>`
#[derive(Debug, Clone)]
pub struct DnfInstall {
    pub packages: Vec<String>,
}

impl SystemCommand for DnfInstall {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(self.packages.iter().cloned());
        args
    }
}

/// `dnf remove -y <package>`
#[derive(Debug, Clone)]
pub struct DnfRemove {
    pub package: String,
}

impl SystemCommand for DnfRemove {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "remove".to_string(),
            "-y".to_string(),
            self.package.clone(),
        ]
    }
}

/// `dnf makecache`
#[derive(Debug, Clone)]
pub struct DnfMakecache;

impl SystemCommand for DnfMakecache {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["makecache".to_string()]
    }
}

/// `dnf group install -y <group>`
///
/// The group name is a single argument even when it contains spaces.
#[derive(Debug, Clone)]
pub struct DnfGroupInstall {
    pub group: String,
}

impl SystemCommand for DnfGroupInstall {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "group".to_string(),
            "install".to_string(),
            "-y".to_string(),
            self.group.clone(),
        ]
    }
}

/// `dnf clean all`
#[derive(Debug, Clone)]
pub struct DnfCleanAll;

impl SystemCommand for DnfCleanAll {
    fn program(&self) -> &'static str {
        "dnf"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["clean".to_string(), "all".to_string()]
    }
}

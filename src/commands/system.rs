//! Type-safe commands for host identity, mounts, accounts and labels.
//!
//! - `HostnameQuery` / `SetHostname`
//! - `MountPointCheck` / `MountReadOnly`
//! - `UserExists` / `UserAdd` / `SetPassword`
//! - `ChangeLabelType`
//! - `MandbRefresh`
//! - `Which`

use std::path::PathBuf;

use crate::command_traits::SystemCommand;

// ============================================================================
// Hostname
// ============================================================================

/// `hostname -f` (fully qualified) or plain `hostname` (short form).
#[derive(Debug, Clone)]
pub struct HostnameQuery {
    pub fqdn: bool,
}

impl SystemCommand for HostnameQuery {
    fn program(&self) -> &'static str {
        "hostname"
    }

    fn to_cli_args(&self) -> Vec<String> {
        if self.fqdn {
            vec!["-f".to_string()]
        } else {
            vec![]
        }
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `hostnamectl set-hostname <name>`
#[derive(Debug, Clone)]
pub struct SetHostname {
    pub name: String,
}

impl SystemCommand for SetHostname {
    fn program(&self) -> &'static str {
        "hostnamectl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["set-hostname".to_string(), self.name.clone()]
    }
}

// ============================================================================
// Mounts
// ============================================================================

/// `mountpoint -q <path>`: exits 0 iff something is mounted there.
#[derive(Debug, Clone)]
pub struct MountPointCheck {
    pub path: PathBuf,
}

impl SystemCommand for MountPointCheck {
    fn program(&self) -> &'static str {
        "mountpoint"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-q".to_string(), self.path.display().to_string()]
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `mount -o ro <device> <path>`
#[derive(Debug, Clone)]
pub struct MountReadOnly {
    pub device: PathBuf,
    pub path: PathBuf,
}

impl SystemCommand for MountReadOnly {
    fn program(&self) -> &'static str {
        "mount"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "ro".to_string(),
            self.device.display().to_string(),
            self.path.display().to_string(),
        ]
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// `id -u <user>`: exits 0 iff the account exists.
#[derive(Debug, Clone)]
pub struct UserExists {
    pub username: String,
}

impl SystemCommand for UserExists {
    fn program(&self) -> &'static str {
        "id"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-u".to_string(), self.username.clone()]
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `useradd <user>`
#[derive(Debug, Clone)]
pub struct UserAdd {
    pub username: String,
}

impl SystemCommand for UserAdd {
    fn program(&self) -> &'static str {
        "useradd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.username.clone()]
    }
}

/// `chpasswd` with `user:password` on stdin.
#[derive(Clone)]
pub struct SetPassword {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SetPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetPassword")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SystemCommand for SetPassword {
    fn program(&self) -> &'static str {
        "chpasswd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }

    fn stdin_payload(&self) -> Option<String> {
        Some(format!("{}:{}\n", self.username, self.password))
    }
}

// ============================================================================
// SELinux / man pages / lookup
// ============================================================================

/// `chcon -t <type> <path>`
#[derive(Debug, Clone)]
pub struct ChangeLabelType {
    pub label_type: String,
    pub path: PathBuf,
}

impl SystemCommand for ChangeLabelType {
    fn program(&self) -> &'static str {
        "chcon"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-t".to_string(),
            self.label_type.clone(),
            self.path.display().to_string(),
        ]
    }
}

/// `mandb -q`
#[derive(Debug, Clone)]
pub struct MandbRefresh;

impl SystemCommand for MandbRefresh {
    fn program(&self) -> &'static str {
        "mandb"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-q".to_string()]
    }
}

/// `which <binary>`
#[derive(Debug, Clone)]
pub struct Which {
    pub binary: String,
}

impl SystemCommand for Which {
    fn program(&self) -> &'static str {
        "which"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.binary.clone()]
    }

    fn is_query(&self) -> bool {
        true
    }
}

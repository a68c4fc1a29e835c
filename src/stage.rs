//! Provisioning stages
//!
//! Every step of a run, in execution order. The sequencer walks these in
//! order and records exactly one outcome per stage it reaches.
//!
//! # Stage Flow
//!
//! ```text
//! Facts
//!     ↓
//! Repository
//!     ↓
//! Hostname → PackageRemoval → PackageInstall → ServiceActivation
//!     ↓
//! PortReconfig → ContentProvisioning → AccountProvisioning
//!     ↓
//! DesktopGroup → RemoteContent
//!     ↓
//! Cleanup (always runs)
//! ```

use strum::{Display, EnumIter, IntoEnumIterator};

/// Provisioning stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(u8)]
pub enum Stage {
    /// Probe hostname, optical media and desktop presence
    #[strum(serialize = "facts")]
    Facts = 0,

    /// Choose and write the package repository definition
    #[strum(serialize = "repository")]
    Repository = 1,

    /// Step 1: hostname and hosts file
    #[strum(serialize = "hostname")]
    Hostname = 2,

    /// Step 2: remove the legacy package
    #[strum(serialize = "package-removal")]
    PackageRemoval = 3,

    /// Step 3: install missing required packages (never on GUI hosts)
    #[strum(serialize = "package-install")]
    PackageInstall = 4,

    /// Step 4: enable and start the web server
    #[strum(serialize = "service-activation")]
    ServiceActivation = 5,

    /// Step 5: move the web server to its new port, with rollback
    #[strum(serialize = "port-reconfig")]
    PortReconfig = 6,

    /// Step 6: marker files and security label
    #[strum(serialize = "content")]
    ContentProvisioning = 7,

    /// Step 7: local accounts and passwords
    #[strum(serialize = "accounts")]
    AccountProvisioning = 8,

    /// Step 8: desktop package group (never on GUI hosts)
    #[strum(serialize = "desktop-group")]
    DesktopGroup = 9,

    /// Step 9: documentation and helper scripts from the remote repository
    #[strum(serialize = "remote-content")]
    RemoteContent = 10,

    /// Teardown: repo files, default target, history, self-removal, reboot
    #[strum(serialize = "cleanup")]
    Cleanup = 11,
}

impl Stage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Stages that mutate the host between repository setup and cleanup.
    pub fn provisioning_steps() -> impl Iterator<Item = Stage> {
        Stage::iter().filter(|s| s.is_provisioning_step())
    }

    /// True for the nine numbered provisioning steps.
    pub const fn is_provisioning_step(self) -> bool {
        !matches!(self, Self::Facts | Self::Repository | Self::Cleanup)
    }
}

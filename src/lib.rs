//! hostprep Library
//!
//! One-shot provisioning for RHEL-family lab hosts: facts, repository
//! selection, nine provisioning steps and teardown.

pub mod accounts;
pub mod cleanup;
pub mod cli;
pub mod command_runner;
pub mod command_traits;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod facts;
pub mod hosts;
pub mod httpd;
pub mod plan;
pub mod process_guard;
pub mod remote_docs;
pub mod repo;
pub mod report;
pub mod sanity;
pub mod sequencer;
pub mod stage;

// Re-export main types for convenience
pub use cleanup::{CleanupOptions, CleanupSummary};
pub use command_runner::{
    CommandOutput, CommandRunner, HostRunner, Invocation, ScriptedRunner, run_command,
};
pub use command_traits::SystemCommand;
pub use config::{HostPaths, ProvisionConfig};
pub use error::{ProvisionError, Result};
pub use facts::{HostFacts, MediaLayout};
pub use plan::PackagePlan;
pub use repo::{RepositoryChoice, RepositoryResolution};
pub use report::{ContinuationPolicy, RunReport, StepOutcome, StepRecord, never_abort};
pub use sequencer::{ProvisionContext, RunOptions, provision};
pub use stage::Stage;

//! Local account provisioning.
//!
//! Accounts are created only when missing, but the password is reset on
//! every run for every listed account, pre-existing ones included. Lab hosts
//! rely on that reset; keep it.

use crate::command_runner::{CommandRunner, run_checked, succeeds};
use crate::commands::system::{SetPassword, UserAdd, UserExists};
use crate::error::Result;
use crate::report::StepOutcome;

/// Per-run account tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSummary {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub passwords_set: Vec<String>,
    /// `user: reason` for every account that could not be fully provisioned.
    pub failures: Vec<String>,
}

/// Create `username` if absent, then set its password.
pub fn provision_account(
    runner: &mut dyn CommandRunner,
    username: &str,
    password: &str,
    summary: &mut AccountSummary,
) {
    let exists = succeeds(
        runner,
        &UserExists {
            username: username.to_string(),
        },
    );

    if exists {
        tracing::debug!("User {} already exists", username);
        summary.existing.push(username.to_string());
    } else if let Err(e) = run_checked(
        runner,
        &UserAdd {
            username: username.to_string(),
        },
    ) {
        tracing::warn!("Could not create user {}: {}", username, e);
        summary.failures.push(format!("{}: {}", username, e));
        return;
    } else {
        summary.created.push(username.to_string());
    }

    match run_checked(
        runner,
        &SetPassword {
            username: username.to_string(),
            password: password.to_string(),
        },
    ) {
        Ok(_) => summary.passwords_set.push(username.to_string()),
        Err(e) => {
            tracing::warn!("Could not set password for {}: {}", username, e);
            summary.failures.push(format!("{}: {}", username, e));
        }
    }
}

/// Step 7: provision every listed account.
pub fn provision_accounts(
    runner: &mut dyn CommandRunner,
    users: &[String],
    password: &str,
) -> Result<StepOutcome> {
    let mut summary = AccountSummary::default();
    for user in users {
        provision_account(runner, user, password, &mut summary);
    }

    tracing::info!(
        "Accounts: {} created, {} existing, {} password(s) set",
        summary.created.len(),
        summary.existing.len(),
        summary.passwords_set.len()
    );

    if summary.failures.is_empty() {
        Ok(StepOutcome::success(format!(
            "{} created, {} existing, {} password(s) reset",
            summary.created.len(),
            summary.existing.len(),
            summary.passwords_set.len()
        )))
    } else {
        Ok(StepOutcome::failed(summary.failures.join("; ")))
    }
}

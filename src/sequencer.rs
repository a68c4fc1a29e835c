//! Provisioning orchestration
//!
//! Runs facts, repository resolution, the nine provisioning steps and
//! cleanup, in that order, threading one `ProvisionContext` through all of
//! them.
//!
//! # Failure Policy
//!
//! Every step returns `Result<StepOutcome>`; errors are converted to
//! `StepOutcome::Failed` at the step boundary and never reach cleanup. After
//! each step the `ContinuationPolicy` decides whether to go on. Cleanup runs
//! in every case. The run summary is logged before any reboot is requested.

use crate::accounts::provision_accounts;
use crate::cleanup::{CleanupOptions, CleanupSummary, request_reboot, run_cleanup};
use crate::command_runner::CommandRunner;
use crate::config::{HostPaths, ProvisionConfig};
use crate::content::provision_content;
use crate::error::Result;
use crate::facts::HostFacts;
use crate::hosts::apply_hostname;
use crate::httpd::{activate_service, reconfigure_port};
use crate::plan::{PackagePlan, install_desktop_group, install_required, remove_packages};
use crate::remote_docs::fetch_step;
use crate::repo::{RepositoryResolution, resolve_repository};
use crate::report::{ContinuationPolicy, RunReport, StepOutcome, never_abort};
use crate::stage::Stage;

/// Run-wide switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: ContinuationPolicy,
    pub cleanup: CleanupOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: never_abort,
            cleanup: CleanupOptions::disabled(),
        }
    }
}

/// State threaded through every step and handed to cleanup.
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    pub facts: HostFacts,
    pub repository: RepositoryResolution,
    pub plan: PackagePlan,
    pub report: RunReport,
    pub cleanup: CleanupSummary,
}

/// Execute the full one-shot run.
pub fn provision(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    options: &RunOptions,
) -> ProvisionContext {
    let mut report = RunReport::new();

    let mut facts = HostFacts::probe(runner, paths, config);
    report.record(
        Stage::Facts,
        StepOutcome::success(format!(
            "hostname {:?}, optical {}, gui {}",
            facts.current_hostname,
            facts
                .optical_device
                .as_ref()
                .map_or_else(|| "none".to_string(), |d| d.display().to_string()),
            facts.gui_present
        )),
    );

    let repository = resolve_repository(runner, paths, config, facts.optical_device.as_deref());
    facts.media_looks_like_install_tree = repository.is_local();
    let repo_outcome = match &repository.choice {
        Some(choice) => StepOutcome::success(choice.to_string()),
        None => StepOutcome::failed("no repository configured"),
    };
    let keep_going = (options.policy)(report.record(Stage::Repository, repo_outcome));

    let plan = PackagePlan::from_facts(&facts, config);
    tracing::debug!("Package plan: {:?}", plan);

    let mut ctx = ProvisionContext {
        facts,
        repository,
        plan,
        report,
        cleanup: CleanupSummary::default(),
    };

    if keep_going {
        run_steps(runner, paths, config, options.policy, &mut ctx);
    } else {
        tracing::warn!("Continuation policy stopped the run before provisioning");
    }

    ctx.cleanup = run_cleanup(runner, paths, config, &ctx.repository, &options.cleanup);
    let cleanup_outcome = ctx.cleanup.to_outcome();
    ctx.report.record(Stage::Cleanup, cleanup_outcome);

    ctx.report.log_summary();
    ctx.cleanup.reboot_requested = request_reboot(runner, &options.cleanup);
    ctx
}

fn run_steps(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    policy: ContinuationPolicy,
    ctx: &mut ProvisionContext,
) {
    for stage in Stage::provisioning_steps() {
        let result = run_step(stage, runner, paths, config, ctx);
        let record = ctx.report.record(stage, StepOutcome::from_result(result));
        if !policy(record) {
            tracing::warn!("Continuation policy stopped the run after {}", stage);
            return;
        }
    }
}

fn run_step(
    stage: Stage,
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    ctx: &ProvisionContext,
) -> Result<StepOutcome> {
    match stage {
        Stage::Hostname => apply_hostname(runner, paths, config, &ctx.facts),
        Stage::PackageRemoval => remove_packages(runner, &ctx.plan),
        Stage::PackageInstall => install_required(runner, &ctx.plan),
        Stage::ServiceActivation => activate_service(runner, config),
        Stage::PortReconfig => reconfigure_port(runner, paths, config),
        Stage::ContentProvisioning => provision_content(runner, paths, config),
        Stage::AccountProvisioning => {
            provision_accounts(runner, &config.users, &config.user_password)
        }
        Stage::DesktopGroup => install_desktop_group(runner, &ctx.plan, &config.desktop_group),
        Stage::RemoteContent => fetch_step(runner, paths, config, ctx.plan.installs_allowed),
        Stage::Facts | Stage::Repository | Stage::Cleanup => Ok(StepOutcome::skipped(
            "not a provisioning step",
        )),
    }
}

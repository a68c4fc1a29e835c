//! Web server activation and listen-port reconfiguration.
//!
//! # Reconfiguration Flow
//!
//! ```text
//! Unmodified
//!     ↓ copy config to backup
//! BackedUp
//!     ↓ rewrite Listen directives across the config tree
//! Rewritten
//!     ↓ restart
//! RestartAttempted ──ok──→ Succeeded
//!     ↓ failed
//! RolledBack (backup copied over the config, other files restored)
//!     ↓ restart once more
//! RestartRetried ──ok──→ Succeeded
//!     ↓ failed
//! Failed (logged only)
//! ```
//!
//! # Failure Policy
//!
//! A failed backup stops the reconfiguration before anything is modified.
//! A failed restart triggers exactly one rollback and one retry; there is no
//! further escalation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::command_runner::{CommandRunner, run_checked, succeeds};
use crate::commands::systemctl::{EnableNow, RestartUnit};
use crate::config::{HostPaths, ProvisionConfig};
use crate::error::{ProvisionError, Result};
use crate::facts::probe_package_installed;
use crate::report::StepOutcome;

// ============================================================================
// Listen directive rewrite
// ============================================================================

/// Rewrite one line if it is `Listen <from>` or `Listen <addr>:<from>`.
///
/// Indentation and any trailing arguments are preserved. Comments and other
/// directives return `None`.
pub fn rewrite_listen_line(line: &str, from: u16, to: u16) -> Option<String> {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    let mut fields = body.split_whitespace();
    let directive = fields.next()?;
    if !directive.eq_ignore_ascii_case("Listen") {
        return None;
    }

    let arg = fields.next()?;
    let from = from.to_string();
    let new_arg = if arg == from {
        to.to_string()
    } else {
        let (addr, port) = arg.rsplit_once(':')?;
        if port != from {
            return None;
        }
        format!("{}:{}", addr, to)
    };

    let mut rewritten = format!("{}{} {}", indent, directive, new_arg);
    for extra in fields {
        rewritten.push(' ');
        rewritten.push_str(extra);
    }
    Some(rewritten)
}

/// Apply `rewrite_listen_line` to every line of `text`.
///
/// Line endings are kept as they were. Returns the new text and the number
/// of lines changed.
pub fn rewrite_listen_text(text: &str, from: u16, to: u16) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut changed = 0;

    for line in text.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };
        match rewrite_listen_line(body, from, to) {
            Some(rewritten) => {
                out.push_str(&rewritten);
                changed += 1;
            }
            None => out.push_str(body),
        }
        out.push_str(ending);
    }
    (out, changed)
}

/// A file changed by the tree rewrite, with the bytes it held before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenFile {
    pub path: PathBuf,
    pub original: Vec<u8>,
}

impl RewrittenFile {
    /// Put the original bytes back.
    pub fn restore(&self) -> Result<()> {
        fs::write(&self.path, &self.original)?;
        Ok(())
    }
}

/// Rewrite listen directives in every regular file under `tree`.
///
/// Directories named `exclude_dir` and the paths in `skip` are never
/// entered or modified. Symlinks are not followed and files that are not
/// valid UTF-8 are left alone. Returns the files that changed.
pub fn rewrite_listen_tree(
    tree: &Path,
    exclude_dir: &str,
    skip: &[PathBuf],
    from: u16,
    to: u16,
) -> Result<Vec<RewrittenFile>> {
    let mut rewritten = Vec::new();
    rewrite_tree_into(tree, exclude_dir, skip, from, to, &mut rewritten)?;
    Ok(rewritten)
}

/// Tree rewrite that records each file before writing it, so a caller still
/// holds every snapshot when the walk fails partway.
fn rewrite_tree_into(
    tree: &Path,
    exclude_dir: &str,
    skip: &[PathBuf],
    from: u16,
    to: u16,
    rewritten: &mut Vec<RewrittenFile>,
) -> Result<()> {
    let keep = |entry: &DirEntry| {
        let excluded_dir = entry.depth() > 0
            && entry.file_type().is_dir()
            && entry.file_name().to_str() == Some(exclude_dir);
        !excluded_dir && !skip.iter().any(|s| s == entry.path())
    };

    for entry in WalkDir::new(tree).follow_links(false).into_iter().filter_entry(keep) {
        let entry = entry.map_err(|e| ProvisionError::rewrite(format!("walking {}: {}", tree.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let bytes = fs::read(entry.path())?;
        let Ok(text) = std::str::from_utf8(&bytes) else {
            tracing::debug!("Skipping non-UTF-8 file {}", entry.path().display());
            continue;
        };

        let (new_text, changed) = rewrite_listen_text(text, from, to);
        if changed > 0 {
            rewritten.push(RewrittenFile {
                path: entry.path().to_path_buf(),
                original: bytes,
            });
            fs::write(entry.path(), new_text)?;
            tracing::info!(
                "Rewrote {} listen directive(s) in {}",
                changed,
                entry.path().display()
            );
        }
    }
    Ok(())
}

// ============================================================================
// Reconfiguration state machine
// ============================================================================

/// States of the port reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigState {
    Unmodified,
    BackedUp,
    Rewritten,
    RestartAttempted,
    Succeeded,
    RolledBack,
    RestartRetried,
    Failed,
}

impl fmt::Display for ReconfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unmodified => "unmodified",
            Self::BackedUp => "backed up",
            Self::Rewritten => "rewritten",
            Self::RestartAttempted => "restart attempted",
            Self::Succeeded => "succeeded",
            Self::RolledBack => "rolled back",
            Self::RestartRetried => "restart retried",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Port reconfiguration target, with every path already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReconfig {
    pub config_path: PathBuf,
    pub backup_path: PathBuf,
    pub config_tree: PathBuf,
    pub exclude_dir: String,
    pub port_from: u16,
    pub port_to: u16,
    pub unit: String,
}

/// Result of one reconfiguration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconfigOutcome {
    /// Every state entered, in order, starting with `Unmodified`.
    pub trail: Vec<ReconfigState>,
    pub rewritten_files: Vec<PathBuf>,
}

impl ReconfigOutcome {
    pub fn final_state(&self) -> ReconfigState {
        self.trail.last().copied().unwrap_or(ReconfigState::Unmodified)
    }

    pub fn rolled_back(&self) -> bool {
        self.trail.contains(&ReconfigState::RolledBack)
    }
}

impl ServiceReconfig {
    pub fn from_config(paths: &HostPaths, config: &ProvisionConfig) -> Self {
        Self {
            config_path: paths.resolve(&config.paths.web_config),
            backup_path: paths.resolve(&config.paths.web_config_backup),
            config_tree: paths.resolve(&config.paths.web_config_tree),
            exclude_dir: config.paths.web_config_exclude.clone(),
            port_from: config.listen_port_from,
            port_to: config.listen_port_to,
            unit: config.web_unit.clone(),
        }
    }

    /// Back up, rewrite and restart, rolling back once on restart failure.
    ///
    /// `Err` is returned only before a successful restart could be
    /// attempted: backup failure (nothing modified) or rewrite failure
    /// (every touched file restored).
    pub fn apply(&self, runner: &mut dyn CommandRunner) -> Result<ReconfigOutcome> {
        let mut trail = vec![ReconfigState::Unmodified];

        fs::copy(&self.config_path, &self.backup_path).map_err(|e| {
            ProvisionError::rewrite(format!(
                "backup of {} to {} failed, leaving config untouched: {}",
                self.config_path.display(),
                self.backup_path.display(),
                e
            ))
        })?;
        trail.push(ReconfigState::BackedUp);

        let mut snapshots = Vec::new();
        if let Err(e) = rewrite_tree_into(
            &self.config_tree,
            &self.exclude_dir,
            std::slice::from_ref(&self.backup_path),
            self.port_from,
            self.port_to,
            &mut snapshots,
        ) {
            self.roll_back(&snapshots)?;
            return Err(e);
        }
        let rewritten_files: Vec<PathBuf> = snapshots.iter().map(|f| f.path.clone()).collect();
        trail.push(ReconfigState::Rewritten);

        trail.push(ReconfigState::RestartAttempted);
        if self.restart(runner) {
            trail.push(ReconfigState::Succeeded);
            return Ok(ReconfigOutcome {
                trail,
                rewritten_files,
            });
        }

        tracing::warn!(
            "{} failed to restart on port {}, rolling back {}",
            self.unit,
            self.port_to,
            self.config_tree.display()
        );
        self.roll_back(&snapshots)?;
        trail.push(ReconfigState::RolledBack);

        trail.push(ReconfigState::RestartRetried);
        if self.restart(runner) {
            trail.push(ReconfigState::Succeeded);
        } else {
            tracing::warn!("{} still fails to restart after rollback", self.unit);
            trail.push(ReconfigState::Failed);
        }

        Ok(ReconfigOutcome {
            trail,
            rewritten_files,
        })
    }

    fn restart(&self, runner: &mut dyn CommandRunner) -> bool {
        succeeds(
            runner,
            &RestartUnit {
                unit: self.unit.clone(),
            },
        )
    }

    /// Copy the backup over the main config, then put every other
    /// rewritten file back to its recorded bytes.
    fn roll_back(&self, snapshots: &[RewrittenFile]) -> Result<()> {
        fs::copy(&self.backup_path, &self.config_path)?;
        for file in snapshots.iter().filter(|f| f.path != self.config_path) {
            file.restore()?;
        }
        Ok(())
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Step 4: enable and start the web server if its package is installed.
pub fn activate_service(
    runner: &mut dyn CommandRunner,
    config: &ProvisionConfig,
) -> Result<StepOutcome> {
    if !probe_package_installed(runner, &config.web_package) {
        return Ok(StepOutcome::skipped(format!(
            "{} not installed",
            config.web_package
        )));
    }
    run_checked(
        runner,
        &EnableNow {
            unit: config.web_unit.clone(),
        },
    )?;
    Ok(StepOutcome::success(format!("{} enabled and started", config.web_unit)))
}

/// Step 5: move the web server from the default port to the configured one.
pub fn reconfigure_port(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
) -> Result<StepOutcome> {
    let reconfig = ServiceReconfig::from_config(paths, config);
    if !reconfig.config_path.is_file() {
        return Ok(StepOutcome::skipped(format!(
            "{} not present",
            reconfig.config_path.display()
        )));
    }

    let outcome = reconfig.apply(runner)?;
    let files = outcome.rewritten_files.len();
    Ok(match (outcome.final_state(), outcome.rolled_back()) {
        (ReconfigState::Succeeded, false) => StepOutcome::success(format!(
            "listening on {} ({} file(s) rewritten)",
            reconfig.port_to, files
        )),
        (ReconfigState::Succeeded, true) => StepOutcome::failed(format!(
            "restart on port {} failed; original configuration restored and running",
            reconfig.port_to
        )),
        (state, _) => StepOutcome::failed(format!(
            "restart failed after rollback (state: {})",
            state
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::ScriptedRunner;

    #[test]
    fn test_rewrite_listen_line() {
        assert_eq!(rewrite_listen_line("Listen 80", 80, 82).as_deref(), Some("Listen 82"));
        assert_eq!(
            rewrite_listen_line("    Listen 0.0.0.0:80 http", 80, 82).as_deref(),
            Some("    Listen 0.0.0.0:82 http")
        );
        assert_eq!(
            rewrite_listen_line("Listen [::1]:80", 80, 82).as_deref(),
            Some("Listen [::1]:82")
        );
        assert_eq!(rewrite_listen_line("#Listen 80", 80, 82), None);
        assert_eq!(rewrite_listen_line("Listen 8080", 80, 82), None);
        assert_eq!(rewrite_listen_line("Listen 443 https", 80, 82), None);
        assert_eq!(rewrite_listen_line("ServerName www:80", 80, 82), None);
        assert_eq!(rewrite_listen_line("", 80, 82), None);
    }

    #[test]
    fn test_rewrite_text_preserves_line_endings() {
        let (out, n) = rewrite_listen_text("A b\r\nListen 80\r\nC", 80, 82);
        assert_eq!(out, "A b\r\nListen 82\r\nC");
        assert_eq!(n, 1);
    }

    fn httpd_tree(root: &Path) -> ServiceReconfig {
        let paths = HostPaths::new(root);
        let config = ProvisionConfig::default();
        let reconfig = ServiceReconfig::from_config(&paths, &config);
        fs::create_dir_all(reconfig.config_path.parent().unwrap()).unwrap();
        fs::create_dir_all(reconfig.config_tree.join("conf.d")).unwrap();
        fs::create_dir_all(reconfig.config_tree.join("modules")).unwrap();
        fs::write(&reconfig.config_path, "ServerRoot \"/etc/httpd\"\nListen 80\nInclude conf.d/*.conf\n").unwrap();
        fs::write(reconfig.config_tree.join("conf.d/vhost.conf"), "<VirtualHost *:80>\nListen 10.0.0.1:80\n</VirtualHost>\n").unwrap();
        fs::write(reconfig.config_tree.join("modules/mod.conf"), "Listen 80\n").unwrap();
        fs::write(reconfig.config_tree.join("conf.d/blob.bin"), [0xff, 0xfe, b'L']).unwrap();
        reconfig
    }

    #[test]
    fn test_tree_rewrite_skips_excluded_dir() {
        let dir = tempfile::tempdir().unwrap();
        let reconfig = httpd_tree(dir.path());

        let changed = rewrite_listen_tree(&reconfig.config_tree, "modules", &[], 80, 82).unwrap();
        assert_eq!(changed.len(), 2);
        let vhost = changed
            .iter()
            .find(|f| f.path.ends_with("conf.d/vhost.conf"))
            .unwrap();
        assert!(String::from_utf8_lossy(&vhost.original).contains("Listen 10.0.0.1:80"));
        assert!(fs::read_to_string(&reconfig.config_path).unwrap().contains("\nListen 82\n"));
        assert!(fs::read_to_string(reconfig.config_tree.join("conf.d/vhost.conf"))
            .unwrap()
            .contains("Listen 10.0.0.1:82"));
        assert_eq!(
            fs::read_to_string(reconfig.config_tree.join("modules/mod.conf")).unwrap(),
            "Listen 80\n"
        );
    }

    #[test]
    fn test_apply_success() {
        let dir = tempfile::tempdir().unwrap();
        let reconfig = httpd_tree(dir.path());
        let mut runner = ScriptedRunner::new();

        let outcome = reconfig.apply(&mut runner).unwrap();
        assert_eq!(outcome.final_state(), ReconfigState::Succeeded);
        assert!(!outcome.rolled_back());
        assert_eq!(runner.count("systemctl restart httpd"), 1);
        // backup keeps the original directive
        assert!(fs::read_to_string(&reconfig.backup_path).unwrap().contains("Listen 80"));
    }

    #[test]
    fn test_apply_rolls_back_and_retries_once() {
        let dir = tempfile::tempdir().unwrap();
        let reconfig = httpd_tree(dir.path());
        let original = fs::read(&reconfig.config_path).unwrap();
        let mut runner = ScriptedRunner::new();
        runner.fail("systemctl restart httpd");

        let outcome = reconfig.apply(&mut runner).unwrap();
        assert_eq!(
            outcome.trail,
            vec![
                ReconfigState::Unmodified,
                ReconfigState::BackedUp,
                ReconfigState::Rewritten,
                ReconfigState::RestartAttempted,
                ReconfigState::RolledBack,
                ReconfigState::RestartRetried,
                ReconfigState::Failed,
            ]
        );
        assert_eq!(runner.count("systemctl restart"), 2);
        assert_eq!(fs::read(&reconfig.config_path).unwrap(), original);
    }

    #[test]
    fn test_rollback_restores_included_files() {
        let dir = tempfile::tempdir().unwrap();
        let reconfig = httpd_tree(dir.path());
        let vhost_path = reconfig.config_tree.join("conf.d/vhost.conf");
        let vhost = fs::read(&vhost_path).unwrap();

        let mut runner = ScriptedRunner::new();
        runner.fail("systemctl restart httpd");
        // the retry must run against the original tree
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = seen.clone();
        let watched = vhost_path.clone();
        runner.on("systemctl restart httpd", move |_| {
            log.borrow_mut().push(fs::read_to_string(&watched).unwrap());
        });

        let outcome = reconfig.apply(&mut runner).unwrap();
        assert!(outcome.rolled_back());
        assert_eq!(fs::read(&vhost_path).unwrap(), vhost);
        assert_eq!(
            *seen.borrow(),
            vec![
                "<VirtualHost *:80>\nListen 10.0.0.1:82\n</VirtualHost>\n".to_string(),
                "<VirtualHost *:80>\nListen 10.0.0.1:80\n</VirtualHost>\n".to_string(),
            ]
        );
    }

    #[test]
    fn test_backup_failure_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reconfig = httpd_tree(dir.path());
        let original = fs::read(&reconfig.config_path).unwrap();
        reconfig.backup_path = dir.path().join("no/such/dir/httpd.conf.bak");

        let mut runner = ScriptedRunner::new();
        assert!(reconfig.apply(&mut runner).is_err());
        assert_eq!(fs::read(&reconfig.config_path).unwrap(), original);
        assert!(!runner.called("systemctl"));
    }

    #[test]
    fn test_service_activation_requires_package() {
        let config = ProvisionConfig::default();
        let mut runner = ScriptedRunner::new();
        runner.fail("rpm -q httpd");
        assert!(activate_service(&mut runner, &config).unwrap().is_skipped());
        assert!(!runner.called("systemctl enable"));

        let mut runner = ScriptedRunner::new();
        assert!(activate_service(&mut runner, &config).unwrap().is_success());
        assert_eq!(runner.count("systemctl enable --now httpd"), 1);
    }
}

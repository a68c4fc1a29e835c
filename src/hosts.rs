//! Hostname change and hosts-file maintenance.
//!
//! The hosts-file edit is a pure function so repeated runs can be checked
//! for idempotence without touching a real host.

use std::fs;
use std::io::ErrorKind;

use crate::command_runner::{CommandRunner, run_checked};
use crate::commands::system::SetHostname;
use crate::config::{HostPaths, ProvisionConfig};
use crate::error::Result;
use crate::facts::HostFacts;
use crate::report::StepOutcome;

/// Names that are never substituted in the hosts file.
const RESERVED_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "localhost4",
    "localhost4.localdomain4",
    "localhost6",
    "localhost6.localdomain6",
];

/// Address used for the appended mapping.
const LOOPBACK: &str = "127.0.0.1";

/// Rewrite hosts-file `content` for a rename from `old` to `new`.
///
/// - If `new` already appears as a name, the content is returned unchanged.
/// - Otherwise every name field equal to `old` becomes `new`.
/// - If nothing was substituted, `127.0.0.1   localhost <new>` is appended.
///
/// Comments are never edited. Returns `None` when no change is needed.
pub fn update_hosts(content: &str, old: &str, new: &str) -> Option<String> {
    if content.lines().any(|line| line_has_name(line, new)) {
        return None;
    }

    let substitutable = !old.is_empty() && old != new && !RESERVED_NAMES.contains(&old);
    let mut substituted = false;
    let mut out = String::with_capacity(content.len() + new.len() + 32);

    for line in content.split_inclusive('\n') {
        if substitutable && line_has_name(line, old) {
            out.push_str(&replace_name(line, old, new));
            substituted = true;
        } else {
            out.push_str(line);
        }
    }

    if !substituted {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{}   localhost {}\n", LOOPBACK, new));
    }
    Some(out)
}

/// Name fields of a hosts line (everything after the address, before `#`).
fn names(line: &str) -> impl Iterator<Item = &str> {
    let data = line.split('#').next().unwrap_or("");
    data.split_whitespace().skip(1)
}

fn line_has_name(line: &str, name: &str) -> bool {
    names(line).any(|n| n == name)
}

/// Replace whole-field occurrences of `old`, preserving the original spacing.
fn replace_name(line: &str, old: &str, new: &str) -> String {
    let (data, comment) = match line.find('#') {
        Some(idx) => line.split_at(idx),
        None => (line, ""),
    };

    let mut out = String::with_capacity(line.len() + new.len());
    let mut field_index = 0;
    let mut rest = data;
    while !rest.is_empty() {
        let ws_len = rest.len() - rest.trim_start().len();
        out.push_str(&rest[..ws_len]);
        rest = &rest[ws_len..];
        if rest.is_empty() {
            break;
        }
        let field_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let field = &rest[..field_len];
        // field 0 is the address
        if field_index > 0 && field == old {
            out.push_str(new);
        } else {
            out.push_str(field);
        }
        field_index += 1;
        rest = &rest[field_len..];
    }
    out.push_str(comment);
    out
}

/// Step 1: set the hostname and keep the hosts file in step.
///
/// A host that already has the desired name is left untouched, hosts file
/// included.
pub fn apply_hostname(
    runner: &mut dyn CommandRunner,
    paths: &HostPaths,
    config: &ProvisionConfig,
    facts: &HostFacts,
) -> Result<StepOutcome> {
    if !facts.hostname_differs() {
        return Ok(StepOutcome::skipped(format!(
            "hostname already {}",
            facts.desired_hostname
        )));
    }

    run_checked(
        runner,
        &SetHostname {
            name: facts.desired_hostname.clone(),
        },
    )?;

    let hosts_file = paths.resolve(&config.paths.hosts_file);
    let existing = match fs::read_to_string(&hosts_file) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    match update_hosts(&existing, &facts.current_hostname, &facts.desired_hostname) {
        Some(updated) => {
            fs::write(&hosts_file, updated)?;
            tracing::info!("Updated {}", hosts_file.display());
        }
        None => tracing::info!(
            "{} already maps {}",
            hosts_file.display(),
            facts.desired_hostname
        ),
    }

    Ok(StepOutcome::success(format!(
        "{:?} -> {}",
        facts.current_hostname, facts.desired_hostname
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCK: &str = "127.0.0.1   localhost localhost.localdomain localhost4 localhost4.localdomain4\n::1         localhost localhost.localdomain localhost6 localhost6.localdomain6\n";

    #[test]
    fn test_substitutes_old_name() {
        let content = format!("{}192.168.1.10  oldhost.lab  oldhost # primary\n", STOCK);
        let updated = update_hosts(&content, "oldhost.lab", "servera.lab.example.com").unwrap();
        assert!(updated.contains("192.168.1.10  servera.lab.example.com  oldhost # primary\n"));
        assert!(!updated.contains("127.0.0.1   localhost servera"));
    }

    #[test]
    fn test_appends_when_old_absent() {
        let updated = update_hosts(STOCK, "localhost.localdomain", "servera.lab.example.com").unwrap();
        assert!(updated.starts_with(STOCK));
        assert!(updated.ends_with("127.0.0.1   localhost servera.lab.example.com\n"));
    }

    #[test]
    fn test_reserved_names_are_not_substituted() {
        let updated = update_hosts(STOCK, "localhost", "servera").unwrap();
        assert!(updated.starts_with(STOCK));
    }

    #[test]
    fn test_second_update_is_a_no_op() {
        let once = update_hosts(STOCK, "", "servera").unwrap();
        assert_eq!(update_hosts(&once, "", "servera"), None);
        assert_eq!(update_hosts(&once, "other", "servera"), None);
    }

    #[test]
    fn test_comments_do_not_count() {
        let content = "# servera was here\n";
        let updated = update_hosts(content, "", "servera").unwrap();
        assert!(updated.ends_with("127.0.0.1   localhost servera\n"));
    }

    #[test]
    fn test_missing_trailing_newline() {
        let updated = update_hosts("127.0.0.1 localhost", "", "servera").unwrap();
        assert_eq!(updated, "127.0.0.1 localhost\n127.0.0.1   localhost servera\n");
    }

    #[test]
    fn test_same_name_leaves_file_alone() {
        use crate::command_runner::ScriptedRunner;

        let dir = tempfile::tempdir().unwrap();
        let paths = HostPaths::new(dir.path());
        let config = ProvisionConfig::default();
        let hosts = paths.resolve(&config.paths.hosts_file);
        fs::create_dir_all(hosts.parent().unwrap()).unwrap();
        fs::write(&hosts, STOCK).unwrap();

        let facts = HostFacts {
            current_hostname: config.hostname.clone(),
            desired_hostname: config.hostname.clone(),
            optical_device: None,
            media_looks_like_install_tree: false,
            gui_present: false,
        };
        let mut runner = ScriptedRunner::new();
        let outcome = apply_hostname(&mut runner, &paths, &config, &facts).unwrap();

        assert!(outcome.is_skipped());
        assert!(!runner.called("hostnamectl"));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), STOCK);
    }
}

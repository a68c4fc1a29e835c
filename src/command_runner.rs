//! Type-Safe Command Execution
//!
//! This module provides the ONLY sanctioned way to invoke external
//! collaborators. All command execution goes through `run_command` so that:
//!
//! - Every invocation is logged with its exact command line
//! - Children run in their own process group (see `process_guard`)
//! - Tests can substitute `ScriptedRunner` and assert on call counts
//!
//! # Architecture Rule
//!
//! Provisioning code never calls `std::process::Command` directly. It builds a
//! `SystemCommand` struct and hands it to a `CommandRunner`.

use crate::command_traits::SystemCommand;
use crate::error::{ProvisionError, Result};
use crate::process_guard::CommandProcessGroup;
use std::collections::VecDeque;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, info};

// ============================================================================
// Invocation / Output
// ============================================================================

/// A fully rendered command, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Data piped to stdin (never logged).
    pub stdin: Option<String>,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
    /// True if the command only reads host state.
    pub query: bool,
}

impl Invocation {
    /// Render a typed command.
    pub fn from_command<C: SystemCommand + ?Sized>(cmd: &C) -> Self {
        Self {
            program: cmd.program().to_string(),
            args: cmd.to_cli_args(),
            stdin: cmd.stdin_payload(),
            env: cmd.env_vars(),
            query: cmd.is_query(),
        }
    }

    /// Space-joined command line, used for logs and test matching.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Output from a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, command: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(ProvisionError::Command {
                command: command.to_string(),
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

// ============================================================================
// Runner trait + helpers
// ============================================================================

/// Executes rendered commands against some host.
pub trait CommandRunner {
    /// Run one invocation to completion.
    ///
    /// - `Ok(output)` - the command ran; check `output.success`
    /// - `Err` - the command could not be started
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Execute a typed command.
pub fn run_command<C: SystemCommand>(
    runner: &mut dyn CommandRunner,
    cmd: &C,
) -> Result<CommandOutput> {
    let invocation = Invocation::from_command(cmd);
    if invocation.query {
        debug!("query: {}", invocation.command_line());
    } else {
        info!("exec: {}", invocation.command_line());
    }
    runner.run(&invocation)
}

/// Execute a typed command and turn a non-zero exit into an error.
pub fn run_checked<C: SystemCommand>(
    runner: &mut dyn CommandRunner,
    cmd: &C,
) -> Result<CommandOutput> {
    let output = run_command(runner, cmd)?;
    output.ensure_success(&Invocation::from_command(cmd).command_line())?;
    Ok(output)
}

/// True if the command ran and exited 0. Spawn failures count as `false`.
pub fn succeeds<C: SystemCommand>(runner: &mut dyn CommandRunner, cmd: &C) -> bool {
    match run_command(runner, cmd) {
        Ok(output) => output.success,
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

// ============================================================================
// HostRunner
// ============================================================================

/// Production runner: spawns real processes on this machine.
#[derive(Debug, Default)]
pub struct HostRunner;

impl HostRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for HostRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let command_line = invocation.command_line();

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .in_new_process_group();

        let mut child = cmd.spawn().map_err(|source| ProvisionError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        if let Some(payload) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(payload.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if !result.success && !invocation.query {
            debug!(
                "`{}` exited with {:?}: {}",
                command_line,
                result.exit_code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

// ============================================================================
// ScriptedRunner
// ============================================================================

type Hook = Box<dyn FnMut(&Invocation)>;

struct Rule {
    prefix: String,
    responses: VecDeque<CommandOutput>,
    hook: Option<Hook>,
}

impl Rule {
    fn matches(&self, command_line: &str) -> bool {
        command_line == self.prefix
            || command_line
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with(' '))
    }

    fn next_response(&mut self) -> CommandOutput {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_else(|| CommandOutput::ok(""))
        } else {
            self.responses
                .front()
                .cloned()
                .unwrap_or_else(|| CommandOutput::ok(""))
        }
    }
}

/// In-memory runner that records invocations and answers from rules.
///
/// Rules match on whole words of the command line; the longest matching
/// prefix wins. Queued responses are consumed in order and the last one
/// repeats. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Vec<Invocation>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule_mut(&mut self, prefix: &str) -> &mut Rule {
        let idx = match self.rules.iter().position(|r| r.prefix == prefix) {
            Some(idx) => idx,
            None => {
                self.rules.push(Rule {
                    prefix: prefix.to_string(),
                    responses: VecDeque::new(),
                    hook: None,
                });
                self.rules.len() - 1
            }
        };
        &mut self.rules[idx]
    }

    /// Queue a response for commands starting with `prefix`.
    pub fn respond(&mut self, prefix: &str, output: CommandOutput) -> &mut Self {
        self.rule_mut(prefix).responses.push_back(output);
        self
    }

    /// Queue a successful response with the given stdout.
    pub fn succeed(&mut self, prefix: &str, stdout: &str) -> &mut Self {
        self.respond(prefix, CommandOutput::ok(stdout))
    }

    /// Queue a failing response (exit code 1).
    pub fn fail(&mut self, prefix: &str) -> &mut Self {
        self.respond(prefix, CommandOutput::failed(1, format!("{}: failed", prefix)))
    }

    /// Run `hook` every time a matching command executes.
    pub fn on(&mut self, prefix: &str, hook: impl FnMut(&Invocation) + 'static) -> &mut Self {
        self.rule_mut(prefix).hook = Some(Box::new(hook));
        self
    }

    /// Every invocation in execution order.
    pub fn calls(&self) -> &[Invocation] {
        &self.calls
    }

    /// Command lines in execution order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.iter().map(Invocation::command_line).collect()
    }

    /// Number of executed commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .iter()
            .filter(|inv| {
                let line = inv.command_line();
                line == prefix
                    || line
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(' '))
            })
            .count()
    }

    /// Whether any executed command starts with `prefix`.
    pub fn called(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.push(invocation.clone());
        let line = invocation.command_line();

        let best = self
            .rules
            .iter_mut()
            .filter(|r| r.matches(&line))
            .max_by_key(|r| r.prefix.len());

        match best {
            Some(rule) => {
                if let Some(hook) = rule.hook.as_mut() {
                    hook(invocation);
                }
                Ok(rule.next_response())
            }
            None => Ok(CommandOutput::ok("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dnf::{DnfMakecache, RpmQuery};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_command_line_rendering() {
        let inv = Invocation::from_command(&RpmQuery {
            package: "httpd".to_string(),
        });
        assert_eq!(inv.command_line(), "rpm -q httpd");
        assert!(inv.query);
    }

    #[test]
    fn test_ensure_success() {
        assert!(CommandOutput::ok("").ensure_success("true").is_ok());
        let err = CommandOutput::failed(3, "boom\n")
            .ensure_success("false")
            .unwrap_err();
        assert_eq!(err.to_string(), "`false` failed (exit code 3): boom");
    }

    #[test]
    fn test_scripted_longest_prefix_wins() {
        let mut runner = ScriptedRunner::new();
        runner.fail("rpm -q").succeed("rpm -q git", "git-2.39");

        assert!(succeeds(&mut runner, &RpmQuery { package: "git".to_string() }));
        assert!(!succeeds(&mut runner, &RpmQuery { package: "httpd".to_string() }));
        // word boundary: "git-core" does not match the "rpm -q git" rule
        assert!(!succeeds(&mut runner, &RpmQuery { package: "git-core".to_string() }));
        assert_eq!(runner.count("rpm -q"), 3);
        assert_eq!(runner.count("rpm -q git"), 1);
    }

    #[test]
    fn test_scripted_queue_then_repeat_last() {
        let mut runner = ScriptedRunner::new();
        runner.fail("dnf makecache").succeed("dnf makecache", "");
        let cmd = DnfMakecache;
        assert!(!succeeds(&mut runner, &cmd));
        assert!(succeeds(&mut runner, &cmd));
        assert!(succeeds(&mut runner, &cmd));
    }

    #[test]
    fn test_scripted_hook_fires() {
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let mut runner = ScriptedRunner::new();
        runner.on("rpm -q", move |_| seen.set(seen.get() + 1));

        run_command(&mut runner, &RpmQuery { package: "a".to_string() }).unwrap();
        run_command(&mut runner, &RpmQuery { package: "b".to_string() }).unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_unmatched_commands_succeed() {
        let mut runner = ScriptedRunner::new();
        assert!(succeeds(&mut runner, &DnfMakecache));
        assert_eq!(runner.command_lines(), vec!["dnf makecache".to_string()]);
    }

    #[test]
    fn test_host_runner_reports_missing_binary() {
        struct Missing;
        impl SystemCommand for Missing {
            fn program(&self) -> &'static str {
                "this_binary_definitely_does_not_exist_12345"
            }
            fn to_cli_args(&self) -> Vec<String> {
                vec![]
            }
        }
        let mut runner = HostRunner::new();
        let err = run_command(&mut runner, &Missing).unwrap_err();
        assert!(matches!(err, ProvisionError::Spawn { .. }));
    }

    #[test]
    fn test_host_runner_passes_env_vars() {
        struct PrintEnv;
        impl SystemCommand for PrintEnv {
            fn program(&self) -> &'static str {
                "sh"
            }
            fn to_cli_args(&self) -> Vec<String> {
                vec!["-c".to_string(), "printf %s \"$HOSTPREP_TEST_VALUE\"".to_string()]
            }
            fn env_vars(&self) -> Vec<(String, String)> {
                vec![("HOSTPREP_TEST_VALUE".to_string(), "set".to_string())]
            }
        }
        let mut runner = HostRunner::new();
        let output = run_command(&mut runner, &PrintEnv).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "set");
    }
}

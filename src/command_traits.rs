//! Type-safe external command contracts.
//!
//! This module provides the `SystemCommand` trait. Every external collaborator
//! invocation (package manager, service manager, mount, git, ...) is a struct
//! implementing this trait, so the exact flags live in one place and are
//! checked by the compiler instead of being assembled as ad hoc strings.
//!
//! # Design Goals
//!
//! 1. **Single Source of Truth**: The struct definition IS the command line.
//! 2. **Query vs Mutation**: Each command declares whether it only reads host
//!    state. Probes must be safe to repeat; mutations are logged at `info`.
//! 3. **Stdin Contracts**: Secrets (e.g. `chpasswd` input) travel on stdin,
//!    never on the argument vector.

/// Trait for typed external commands.
///
/// # Contract
///
/// - `program()`: The executable name, resolved through `PATH`.
/// - `to_cli_args()`: Arguments exactly as the program expects them.
/// - `stdin_payload()`: Optional data written to the child's stdin.
/// - `env_vars()`: Extra environment variables for the child.
/// - `is_query()`: True if the command only reads host state.
///
/// # Example
///
/// ```
/// use hostprep::command_traits::SystemCommand;
/// use hostprep::commands::dnf::DnfInstall;
///
/// let cmd = DnfInstall { packages: vec!["httpd".to_string()] };
/// assert_eq!(cmd.program(), "dnf");
/// assert_eq!(cmd.to_cli_args(), vec!["install", "-y", "httpd"]);
/// ```
pub trait SystemCommand {
    /// Executable name (e.g., "dnf").
    fn program(&self) -> &'static str;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Data piped to stdin, if any.
    fn stdin_payload(&self) -> Option<String> {
        None
    }

    /// Environment variables added to the child's environment.
    fn env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Whether the command only inspects the host.
    fn is_query(&self) -> bool {
        false
    }
}

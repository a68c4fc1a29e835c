//! Type-safe commands for the version-control client.

use std::path::PathBuf;

use crate::command_traits::SystemCommand;

/// Environment that makes git fail instead of prompting.
///
/// Children run in their own process group, so a credential or host-key
/// prompt on the terminal would stop them with SIGTTIN and never return.
fn non_interactive_env() -> Vec<(String, String)> {
    vec![
        ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        (
            "GIT_SSH_COMMAND".to_string(),
            "ssh -o BatchMode=yes".to_string(),
        ),
    ]
}

/// `git ls-remote --heads <url>`: reachability probe without cloning.
#[derive(Debug, Clone)]
pub struct GitLsRemote {
    pub url: String,
}

impl SystemCommand for GitLsRemote {
    fn program(&self) -> &'static str {
        "git"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "ls-remote".to_string(),
            "--heads".to_string(),
            self.url.clone(),
        ]
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        non_interactive_env()
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `git clone --depth 1 <url> <dest>`
#[derive(Debug, Clone)]
pub struct GitShallowClone {
    pub url: String,
    pub dest: PathBuf,
}

impl SystemCommand for GitShallowClone {
    fn program(&self) -> &'static str {
        "git"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "clone".to_string(),
            "--depth".to_string(),
            "1".to_string(),
            self.url.clone(),
            self.dest.display().to_string(),
        ]
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        non_interactive_env()
    }
}

//! Type-safe commands for the service manager.

use crate::command_traits::SystemCommand;

/// `systemctl get-default`
#[derive(Debug, Clone)]
pub struct GetDefaultTarget;

impl SystemCommand for GetDefaultTarget {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["get-default".to_string()]
    }

    fn is_query(&self) -> bool {
        true
    }
}

/// `systemctl set-default <target>`
#[derive(Debug, Clone)]
pub struct SetDefaultTarget {
    pub target: String,
}

impl SystemCommand for SetDefaultTarget {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["set-default".to_string(), self.target.clone()]
    }
}

/// `systemctl enable --now <unit>`
#[derive(Debug, Clone)]
pub struct EnableNow {
    pub unit: String,
}

impl SystemCommand for EnableNow {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "enable".to_string(),
            "--now".to_string(),
            self.unit.clone(),
        ]
    }
}

/// `systemctl restart <unit>`
#[derive(Debug, Clone)]
pub struct RestartUnit {
    pub unit: String,
}

impl SystemCommand for RestartUnit {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["restart".to_string(), self.unit.clone()]
    }
}

/// `systemctl reboot`
#[derive(Debug, Clone)]
pub struct Reboot;

impl SystemCommand for Reboot {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["reboot".to_string()]
    }
}

use clap::Parser;
use std::path::PathBuf;

/// hostprep - one-shot provisioning for RHEL-family lab hosts
///
/// With no arguments the host is provisioned with the built-in lab
/// configuration, the executable deletes itself and the host reboots.
#[derive(Parser, Debug)]
#[command(name = "hostprep")]
#[command(about = "One-shot provisioning routine for RHEL-family lab hosts")]
#[command(version)]
pub struct Cli {
    /// JSON file overriding any subset of the built-in configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep the executable and do not reboot at the end of cleanup
    #[arg(long)]
    pub no_reboot: bool,

    /// Host root every configured path is resolved against
    #[arg(long, default_value = "/")]
    pub root: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

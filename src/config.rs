//! Provisioning configuration.
//!
//! Every fixed value the provisioning run depends on lives in
//! `ProvisionConfig`. The compiled-in defaults describe the standard lab host;
//! a JSON file can override any subset of fields.
//!
//! All filesystem locations are absolute paths resolved through `HostPaths`,
//! which prefixes them with a host root (`/` in production).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};

/// Filesystem locations touched by a run, as absolute paths on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub hosts_file: String,
    pub fstab: String,
    pub repo_dir: String,
    /// Candidate optical devices in preference order.
    pub optical_devices: Vec<String>,
    pub dvd_mount: String,
    pub web_config: String,
    pub web_config_backup: String,
    pub web_config_tree: String,
    /// Directory name under `web_config_tree` the port rewrite never enters.
    pub web_config_exclude: String,
    pub web_root: String,
    pub man_dir: String,
    pub bin_dir: String,
    pub docs_work_dir: String,
    pub shell_history: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            hosts_file: "/etc/hosts".to_string(),
            fstab: "/etc/fstab".to_string(),
            repo_dir: "/etc/yum.repos.d".to_string(),
            optical_devices: vec!["/dev/sr1".to_string(), "/dev/sr0".to_string()],
            dvd_mount: "/mnt/dvd".to_string(),
            web_config: "/etc/httpd/conf/httpd.conf".to_string(),
            web_config_backup: "/etc/httpd/conf/httpd.conf.bak".to_string(),
            web_config_tree: "/etc/httpd".to_string(),
            web_config_exclude: "modules".to_string(),
            web_root: "/var/www/html".to_string(),
            man_dir: "/usr/share/man/man1".to_string(),
            bin_dir: "/usr/local/bin".to_string(),
            docs_work_dir: "/var/tmp/hostprep-docs".to_string(),
            shell_history: "/root/.bash_history".to_string(),
        }
    }
}

/// Executable written to the helper directory after a docs fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperScript {
    pub name: String,
    pub body: String,
}

impl HelperScript {
    fn new(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            body: body.to_string(),
        }
    }
}

fn default_helper_scripts() -> Vec<HelperScript> {
    vec![
        HelperScript::new(
            "lab-docs",
            "#!/bin/bash\n# Open the lab manual page (or the one named on the command line)\nexec man \"${1:-lab}\"\n",
        ),
        HelperScript::new(
            "lab-status",
            "#!/bin/bash\n# Summarise the provisioned state of this host\necho \"hostname: $(hostname -f)\"\necho \"default target: $(systemctl get-default)\"\necho \"httpd: $(systemctl is-active httpd)\"\ngrep -rh '^Listen' /etc/httpd/conf 2>/dev/null\n",
        ),
    ]
}

/// Complete configuration for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Hostname the machine should end up with.
    pub hostname: String,
    /// Package removed mid-run and again during cleanup.
    pub legacy_package: String,
    /// Packages installed when missing (never on GUI hosts).
    pub required_packages: Vec<String>,
    pub web_package: String,
    pub web_unit: String,
    pub listen_port_from: u16,
    pub listen_port_to: u16,
    /// Empty files created under the web root.
    pub marker_files: Vec<String>,
    /// Marker that receives `wrong_label_type`.
    pub labelled_marker: String,
    pub wrong_label_type: String,
    pub users: Vec<String>,
    /// Reset on every run, for new and existing accounts alike.
    pub user_password: String,
    pub desktop_group: String,
    pub gui_session_package: String,
    pub x_server_package: String,
    pub graphical_target: String,
    pub text_target: String,
    pub vcs_package: String,
    pub docs_repo_url: String,
    pub helper_scripts: Vec<HelperScript>,
    pub reboot: bool,
    pub remove_self: bool,
    pub reboot_delay_secs: u64,
    pub paths: PathConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            hostname: "servera.lab.example.com".to_string(),
            legacy_package: "cockpit".to_string(),
            required_packages: vec![
                "httpd".to_string(),
                "policycoreutils-python-utils".to_string(),
                "bash-completion".to_string(),
                "man-db".to_string(),
            ],
            web_package: "httpd".to_string(),
            web_unit: "httpd".to_string(),
            listen_port_from: 80,
            listen_port_to: 82,
            marker_files: vec![
                "file1".to_string(),
                "file2".to_string(),
                "file3".to_string(),
            ],
            labelled_marker: "file1".to_string(),
            wrong_label_type: "default_t".to_string(),
            users: [
                "harry", "natasha", "sarah", "alex", "bob", "john", "tom", "andrew", "jack",
                "lisa",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            user_password: "root".to_string(),
            desktop_group: "Server with GUI".to_string(),
            gui_session_package: "gnome-session".to_string(),
            x_server_package: "xorg-x11-server-Xorg".to_string(),
            graphical_target: "graphical.target".to_string(),
            text_target: "multi-user.target".to_string(),
            vcs_package: "git".to_string(),
            docs_repo_url: "https://git.example.com/rhcsa/lab-docs.git".to_string(),
            helper_scripts: default_helper_scripts(),
            reboot: true,
            remove_self: true,
            reboot_delay_secs: 5,
            paths: PathConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration overrides from a JSON file.
    ///
    /// Fields absent from the file keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            ProvisionError::config(format!(
                "Failed to read configuration from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_hostname(&self.hostname) {
            return Err(ProvisionError::config(format!(
                "Invalid hostname '{}': labels must be 1-63 alphanumeric/hyphen characters",
                self.hostname
            )));
        }

        if self.users.is_empty() {
            return Err(ProvisionError::config("At least one user must be listed"));
        }
        if let Some(bad) = self.users.iter().find(|u| !is_valid_username(u)) {
            return Err(ProvisionError::config(format!("Invalid username '{}'", bad)));
        }

        if self.listen_port_from == 0 || self.listen_port_to == 0 {
            return Err(ProvisionError::config("Listen ports must be non-zero"));
        }
        if self.listen_port_from == self.listen_port_to {
            return Err(ProvisionError::config(
                "listen_port_from and listen_port_to must differ",
            ));
        }

        if !self.marker_files.contains(&self.labelled_marker) {
            return Err(ProvisionError::config(format!(
                "labelled_marker '{}' is not one of marker_files",
                self.labelled_marker
            )));
        }
        if let Some(bad) = self
            .marker_files
            .iter()
            .find(|m| m.is_empty() || m.contains('/'))
        {
            return Err(ProvisionError::config(format!(
                "Marker file '{}' must be a plain file name",
                bad
            )));
        }

        if let Some(bad) = self
            .helper_scripts
            .iter()
            .find(|h| h.name.is_empty() || h.name.contains('/'))
        {
            return Err(ProvisionError::config(format!(
                "Helper script '{}' must be a plain file name",
                bad.name
            )));
        }

        let url = self.docs_repo_url.trim();
        if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("git://")
            && !url.starts_with("ssh://")
        {
            return Err(ProvisionError::config(
                "docs_repo_url must start with http://, https://, git://, or ssh://",
            ));
        }

        Ok(())
    }
}

/// RFC 1123 hostname check.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// shadow-utils style username check.
pub fn is_valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 32
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

// ============================================================================
// Host paths
// ============================================================================

/// Resolves absolute host paths against a root prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    root: PathBuf,
}

impl HostPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/etc/hosts` with root `/tmp/x` becomes `/tmp/x/etc/hosts`.
    pub fn resolve(&self, absolute: impl AsRef<Path>) -> PathBuf {
        let absolute = absolute.as_ref();
        self.root
            .join(absolute.strip_prefix("/").unwrap_or(absolute))
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::new("/")
    }
}

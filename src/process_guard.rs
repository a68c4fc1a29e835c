//! Process isolation for external commands
//!
//! Every collaborator (dnf, systemctl, git, ...) is spawned in its own process
//! group with a parent-death signal. If hostprep is killed while `dnf` is in
//! the middle of a transaction, the child receives SIGTERM instead of being
//! orphaned and left to finish against a host nobody is watching.

use nix::libc;
use nix::unistd::Pid;

/// Extension trait to spawn commands in their own process group.
pub trait CommandProcessGroup {
    /// Place the child in a new process group and arm PR_SET_PDEATHSIG.
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                // PGID = child PID
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                Ok(())
            });
        }
        self
    }
}

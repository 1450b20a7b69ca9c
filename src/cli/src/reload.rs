//! Daemon reload by signalling the pid in a pid file.

use std::path::PathBuf;

use nodeprov_core::{DaemonReload, ProvisionError, Result};

/// Sends SIGHUP to the daemon named by `pid_file`.
///
/// A missing pid file means the daemon is not running; nothing to reload.
pub struct PidFileReloader {
    pid_file: PathBuf,
}

impl PidFileReloader {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
        }
    }

    fn read_pid(&self) -> Result<Option<libc::pid_t>> {
        let content = match std::fs::read_to_string(&self.pid_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ProvisionError::io(&self.pid_file)(e)),
        };
        let pid = content.trim().parse::<libc::pid_t>().map_err(|e| ProvisionError::Parse {
            field: "pid file".to_string(),
            value: content.trim().to_string(),
            reason: e.to_string(),
        })?;
        if pid <= 0 {
            return Err(ProvisionError::Parse {
                field: "pid file".to_string(),
                value: pid.to_string(),
                reason: "pid must be positive".to_string(),
            });
        }
        Ok(Some(pid))
    }
}

impl DaemonReload for PidFileReloader {
    fn reload(&self) -> Result<()> {
        let Some(pid) = self.read_pid()? else {
            tracing::debug!(pid_file = %self.pid_file.display(), "Daemon not running, skipping reload");
            return Ok(());
        };
        let ret = unsafe { libc::kill(pid, libc::SIGHUP) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            return Err(ProvisionError::Other(format!(
                "failed to signal daemon (pid {pid}): {err}"
            )));
        }
        tracing::info!(pid, "Reloaded daemon");
        Ok(())
    }
}

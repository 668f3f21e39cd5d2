//! auditd lifecycle management.
//!
//! Records only flow once auditd has configured the kernel, so a session
//! first makes sure the daemon is up. If this process had to start it, the
//! returned guard stops it again on drop, leaving the host the way it was
//! found.

use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

fn service(action: &str) -> Result<bool> {
    let status = Command::new("service")
        .args(["auditd", action])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|_| Error::Service {
            command: format!("service auditd {action}"),
        })?;
    debug!(action, success = status.success(), "service auditd");
    Ok(status.success())
}

/// Stops auditd on drop if this process started it.
#[derive(Debug)]
pub struct AuditdGuard {
    started_by_us: bool,
}

impl AuditdGuard {
    /// True if auditd was started by [`ensure_running`].
    pub fn started_by_us(&self) -> bool {
        self.started_by_us
    }
}

impl Drop for AuditdGuard {
    fn drop(&mut self) {
        if !self.started_by_us {
            return;
        }
        match service("onestop") {
            Ok(true) => info!("stopped auditd"),
            Ok(false) => warn!("service auditd onestop exited with an error"),
            Err(err) => warn!(%err, "failed to stop auditd"),
        }
    }
}

/// Make sure auditd is running, starting it if needed.
///
/// Uses the `one*` rc actions so the daemon runs even when auditd is not
/// enabled in rc.conf.
pub fn ensure_running() -> Result<AuditdGuard> {
    if service("onestatus")? {
        return Ok(AuditdGuard {
            started_by_us: false,
        });
    }
    if !service("onestart")? {
        return Err(Error::Service {
            command: "service auditd onestart".to_string(),
        });
    }
    info!("started auditd");
    Ok(AuditdGuard {
        started_by_us: true,
    })
}

//! Process execution auditing tests.
//!
//! execve(2) is audited under the `ex` class. Argument vectors only
//! appear in records while the argv audit policy is enabled, so the
//! success test turns it on through a guard that restores the previous
//! policy on drop.

use std::ffi::CString;
use std::process::Command;
use std::ptr;

use aupipe::auditon::{self, PolicyGuard, AUDIT_ARGV};
use aupipe::{AuditSession, Result};
use regex::Regex;

use crate::common::pid;

fn pat(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

#[test]
fn test_execve_success_renders_argv() -> Result<()> {
    require_root!();

    let guard = PolicyGuard::save()?;
    auditon::set_policy(guard.saved() | AUDIT_ARGV)?;

    // Unique marker so the pattern can only match our child's record.
    let marker = format!("sample-argument-{}", pid());
    let mut session = AuditSession::begin("ex")?;

    let status = Command::new("/usr/bin/true").arg(&marker).status().unwrap();
    assert!(status.success());

    session.expect_record(&pat(&format!(
        "execve.*exec arg.*{marker}.*return,success"
    )))?;
    Ok(())
}

#[test]
fn test_execve_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ex")?;

    // An invalid envp pointer makes execve fail with EFAULT without
    // replacing this process.
    let bin = CString::new("/usr/bin/true").unwrap();
    let argv = [bin.as_ptr(), ptr::null()];
    let ret = unsafe { libc::execve(bin.as_ptr(), argv.as_ptr(), usize::MAX as *const _) };
    assert_eq!(ret, -1);

    session.expect_record(&pat(&format!("execve.*{}.*return,failure", pid())))?;
    Ok(())
}

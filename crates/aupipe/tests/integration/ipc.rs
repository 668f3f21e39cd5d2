//! System V IPC syscall auditing tests.
//!
//! IPC records identify the object by numeric id, so patterns anchor on
//! the test pid and the outcome.

use aupipe::{AuditSession, Result};
use regex::Regex;

use crate::common::pid;

fn pat(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

#[test]
fn test_msgget_success() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    let id = unsafe { libc::msgget(libc::IPC_PRIVATE, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);

    let result = session.expect_record(&pat(&format!("msgget.*{}.*return,success", pid())));
    unsafe { libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    result?;
    Ok(())
}

#[test]
fn test_msgctl_rmid_success() -> Result<()> {
    require_root!();

    let id = unsafe { libc::msgget(libc::IPC_PRIVATE, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);
    let mut session = AuditSession::begin("ip")?;

    let ret = unsafe { libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    assert_eq!(ret, 0);

    session.expect_record(&pat(&format!("msgctl.*{}.*return,success", pid())))?;
    Ok(())
}

#[test]
fn test_msgctl_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    let ret = unsafe { libc::msgctl(-1, libc::IPC_RMID, std::ptr::null_mut()) };
    assert_eq!(ret, -1);

    session.expect_record(&pat(&format!("msgctl.*{}.*return,failure", pid())))?;
    Ok(())
}

#[test]
fn test_shmget_success() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    let id = unsafe { libc::shmget(libc::IPC_PRIVATE, 4096, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);

    let result = session.expect_record(&pat(&format!("shmget.*{}.*return,success", pid())));
    unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    result?;
    Ok(())
}

#[test]
fn test_shmat_and_shmdt_success() -> Result<()> {
    require_root!();

    let id = unsafe { libc::shmget(libc::IPC_PRIVATE, 4096, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);
    let mut session = AuditSession::begin("ip")?;

    let addr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
    assert_ne!(addr, usize::MAX as *mut libc::c_void);
    session.expect_record(&pat(&format!("shmat.*{}.*return,success", pid())))?;

    let ret = unsafe { libc::shmdt(addr) };
    assert_eq!(ret, 0);
    session.expect_record(&pat(&format!("shmdt.*{}.*return,success", pid())))?;

    unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    Ok(())
}

#[test]
fn test_shmat_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    let addr = unsafe { libc::shmat(-1, std::ptr::null(), 0) };
    assert_eq!(addr, usize::MAX as *mut libc::c_void);

    session.expect_record(&pat(&format!("shmat.*{}.*return,failure", pid())))?;
    Ok(())
}

#[test]
fn test_shmctl_rmid_success() -> Result<()> {
    require_root!();

    let id = unsafe { libc::shmget(libc::IPC_PRIVATE, 4096, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);
    let mut session = AuditSession::begin("ip")?;

    let ret = unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    assert_eq!(ret, 0);

    session.expect_record(&pat(&format!("shmctl.*{}.*return,success", pid())))?;
    Ok(())
}

#[test]
fn test_semget_success() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    let id = unsafe { libc::semget(libc::IPC_PRIVATE, 1, libc::IPC_CREAT | 0o600) };
    assert!(id >= 0);

    let result = session.expect_record(&pat(&format!("semget.*{}.*return,success", pid())));
    unsafe { libc::semctl(id, 0, libc::IPC_RMID) };
    result?;
    Ok(())
}

#[test]
fn test_semget_failure() -> Result<()> {
    require_root!();

    let mut session = AuditSession::begin("ip")?;

    // Negative nsems is rejected with EINVAL.
    let ret = unsafe { libc::semget(libc::IPC_PRIVATE, -1, libc::IPC_CREAT | 0o600) };
    assert_eq!(ret, -1);

    session.expect_record(&pat(&format!("semget.*{}.*return,failure", pid())))?;
    Ok(())
}

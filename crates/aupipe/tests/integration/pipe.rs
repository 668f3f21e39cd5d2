//! Audit pipe ioctl integration tests.
//!
//! Exercises the queue, preselection and flush controls on a private
//! `/dev/auditpipe` descriptor. Every test restores any setting it
//! changes before returning.

use std::time::Duration;

use aupipe::{AuMask, AuditPipe, PreselectMode, Result};

#[test]
fn test_open_reports_queue_state() -> Result<()> {
    require_root!();

    let pipe = AuditPipe::open()?;
    let min = pipe.qlimit_min()?;
    let max = pipe.qlimit_max()?;
    let limit = pipe.qlimit()?;
    assert!(min <= limit && limit <= max, "{min} <= {limit} <= {max}");
    assert!(pipe.max_audit_data()? > 0);
    Ok(())
}

#[test]
fn test_qlimit_roundtrip() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    let saved = pipe.qlimit()?;
    let min = pipe.qlimit_min()?;

    pipe.set_qlimit(min)?;
    assert_eq!(pipe.qlimit()?, min);

    pipe.set_qlimit(saved)?;
    assert_eq!(pipe.qlimit()?, saved);
    Ok(())
}

#[test]
fn test_qlimit_rejects_out_of_range() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    let max = pipe.qlimit_max()?;

    let err = pipe.set_qlimit(max + 1).unwrap_err();
    assert_eq!(err.errno(), Some(libc::EINVAL));

    let min = pipe.qlimit_min()?;
    if min > 0 {
        let err = pipe.set_qlimit(min - 1).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EINVAL));
    }
    Ok(())
}

#[test]
fn test_flush_empties_queue() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    pipe.flush()?;
    assert_eq!(pipe.qlen()?, 0);
    Ok(())
}

#[test]
fn test_preselect_mode_set_get() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;

    pipe.set_preselect_mode(PreselectMode::Local)?;
    assert_eq!(pipe.preselect_mode()?, PreselectMode::Local);

    // Setting the same mode again must be a no-op.
    pipe.set_preselect_mode(PreselectMode::Local)?;
    assert_eq!(pipe.preselect_mode()?, PreselectMode::Local);

    pipe.set_preselect_mode(PreselectMode::Trail)?;
    assert_eq!(pipe.preselect_mode()?, PreselectMode::Trail);
    Ok(())
}

#[test]
fn test_preselect_flags_roundtrip() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    let mask = AuMask::both(0x10);

    pipe.set_preselect_flags(mask)?;
    assert_eq!(pipe.preselect_flags()?, mask);

    pipe.set_preselect_flags(mask)?;
    assert_eq!(pipe.preselect_flags()?, mask);
    Ok(())
}

#[test]
fn test_preselect_naflags_roundtrip() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    let mask = AuMask::both(0x100);

    pipe.set_preselect_naflags(mask)?;
    assert_eq!(pipe.preselect_naflags()?, mask);
    Ok(())
}

#[test]
fn test_prime_is_idempotent() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    let mask = AuMask::both(0x10);

    pipe.prime(mask)?;
    let first_mode = pipe.preselect_mode()?;
    let first_flags = pipe.preselect_flags()?;

    pipe.prime(mask)?;
    assert_eq!(pipe.preselect_mode()?, first_mode);
    assert_eq!(pipe.preselect_flags()?, first_flags);
    assert_eq!(first_mode, PreselectMode::Local);
    assert_eq!(first_flags, mask);
    Ok(())
}

#[test]
fn test_wait_readable_times_out_on_silent_pipe() -> Result<()> {
    require_root!();

    let mut pipe = AuditPipe::open()?;
    // Empty masks select nothing, so nothing can arrive.
    pipe.prime(AuMask::default())?;
    pipe.set_preselect_naflags(AuMask::default())?;
    pipe.flush()?;

    assert!(!pipe.wait_readable(Duration::from_millis(50))?);
    Ok(())
}

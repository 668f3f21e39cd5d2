//! auditon(2) and related audit syscall wrappers.
//!
//! These calls configure the kernel audit subsystem globally, unlike the
//! per-descriptor audit pipe state. Tests that change global state use the
//! guard types here to snapshot the previous value and restore it on drop,
//! so a failing assertion cannot leave the host misconfigured.

use std::ffi::CString;
use std::io;

use tracing::warn;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::class::AuMask;
use crate::error::{Error, Result};

// Commands from bsm/audit.h.
pub const A_GETKMASK: libc::c_int = 4;
pub const A_SETKMASK: libc::c_int = 5;
pub const A_GETCWD: libc::c_int = 8;
pub const A_GETCAR: libc::c_int = 9;
pub const A_GETSTAT: libc::c_int = 12;
pub const A_SETSTAT: libc::c_int = 13;
pub const A_SETUMASK: libc::c_int = 14;
pub const A_SETSMASK: libc::c_int = 15;
pub const A_GETKAUDIT: libc::c_int = 29;
pub const A_SETKAUDIT: libc::c_int = 30;
pub const A_GETPOLICY: libc::c_int = 33;
pub const A_SETPOLICY: libc::c_int = 34;

// Audit policy flags.
pub const AUDIT_CNT: u32 = 0x0001;
pub const AUDIT_AHLT: u32 = 0x0002;
pub const AUDIT_ARGV: u32 = 0x0004;
pub const AUDIT_ARGE: u32 = 0x0008;

unsafe extern "C" {
    fn auditon(cmd: libc::c_int, data: *mut libc::c_void, length: libc::c_int) -> libc::c_int;
    fn audit(record: *const libc::c_void, length: libc::c_int) -> libc::c_int;
    fn getauid(auid: *mut u32) -> libc::c_int;
    fn setauid(auid: *const u32) -> libc::c_int;
    fn getaudit_addr(info: *mut AuditInfoAddr, length: libc::c_int) -> libc::c_int;
    fn setaudit_addr(info: *const AuditInfoAddr, length: libc::c_int) -> libc::c_int;
    fn auditctl(path: *const libc::c_char) -> libc::c_int;
}

/// Terminal id (`au_tid_addr_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TermIdAddr {
    /// Terminal port.
    pub at_port: u32,
    /// Address type (AU_IPv4 or AU_IPv6).
    pub at_type: u32,
    /// Terminal address.
    pub at_addr: [u32; 4],
}

/// Extended audit session state (`auditinfo_addr_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct AuditInfoAddr {
    /// Audit user id.
    pub ai_auid: u32,
    /// Preselection mask.
    pub ai_mask: AuMask,
    /// Terminal id.
    pub ai_termid: TermIdAddr,
    /// Audit session id.
    pub ai_asid: i32,
    /// Audit session flags.
    pub ai_flags: u64,
}

fn auditon_get<T>(command: &'static str, cmd: libc::c_int, value: &mut T) -> Result<()> {
    // SAFETY: value is a valid, exclusive pointer and the length matches.
    let ret = unsafe {
        auditon(
            cmd,
            (value as *mut T).cast::<libc::c_void>(),
            size_of::<T>() as libc::c_int,
        )
    };
    if ret < 0 {
        return Err(Error::auditon(command));
    }
    Ok(())
}

fn auditon_set<T>(command: &'static str, cmd: libc::c_int, value: &T) -> Result<()> {
    // auditon takes void* for both directions; set commands only read it.
    // SAFETY: value is valid for reads and the length matches.
    let ret = unsafe {
        auditon(
            cmd,
            (value as *const T).cast_mut().cast::<libc::c_void>(),
            size_of::<T>() as libc::c_int,
        )
    };
    if ret < 0 {
        return Err(Error::auditon(command));
    }
    Ok(())
}

/// Current audit policy flags (A_GETPOLICY).
pub fn policy() -> Result<u32> {
    let mut value: libc::c_int = 0;
    auditon_get("A_GETPOLICY", A_GETPOLICY, &mut value)?;
    Ok(value as u32)
}

/// Set the audit policy flags (A_SETPOLICY).
pub fn set_policy(flags: u32) -> Result<()> {
    let value = flags as libc::c_int;
    auditon_set("A_SETPOLICY", A_SETPOLICY, &value)
}

/// Kernel preselection mask for attributable events (A_GETKMASK).
pub fn kernel_mask() -> Result<AuMask> {
    let mut mask = AuMask::default();
    auditon_get("A_GETKMASK", A_GETKMASK, &mut mask)?;
    Ok(mask)
}

/// Set the kernel preselection mask (A_SETKMASK).
pub fn set_kernel_mask(mask: AuMask) -> Result<()> {
    auditon_set("A_SETKMASK", A_SETKMASK, &mask)
}

/// Kernel audit host information (A_GETKAUDIT).
pub fn kernel_info() -> Result<AuditInfoAddr> {
    let mut info = AuditInfoAddr::default();
    auditon_get("A_GETKAUDIT", A_GETKAUDIT, &mut info)?;
    Ok(info)
}

/// Set the kernel audit host information (A_SETKAUDIT).
pub fn set_kernel_info(info: &AuditInfoAddr) -> Result<()> {
    auditon_set("A_SETKAUDIT", A_SETKAUDIT, info)
}

/// Issue an auditon command with no payload, for probing whether the
/// kernel implements it.
pub fn probe(command: &'static str, cmd: libc::c_int) -> Result<()> {
    // SAFETY: a null payload with zero length is valid for probing.
    let ret = unsafe { auditon(cmd, std::ptr::null_mut(), 0) };
    if ret < 0 {
        return Err(Error::auditon(command));
    }
    Ok(())
}

/// Audit id of the calling process (getauid(2)).
pub fn audit_id() -> Result<u32> {
    let mut auid: u32 = 0;
    // SAFETY: auid is a valid out-pointer.
    if unsafe { getauid(&mut auid) } < 0 {
        return Err(Error::auditon("getauid"));
    }
    Ok(auid)
}

/// Set the audit id of the calling process (setauid(2)).
pub fn set_audit_id(auid: u32) -> Result<()> {
    // SAFETY: auid is a valid in-pointer.
    if unsafe { setauid(&auid) } < 0 {
        return Err(Error::auditon("setauid"));
    }
    Ok(())
}

/// Audit session state of the calling process (getaudit_addr(2)).
pub fn process_info() -> Result<AuditInfoAddr> {
    let mut info = AuditInfoAddr::default();
    // SAFETY: info is a valid out-pointer and the length matches.
    if unsafe { getaudit_addr(&mut info, size_of::<AuditInfoAddr>() as libc::c_int) } < 0 {
        return Err(Error::auditon("getaudit_addr"));
    }
    Ok(info)
}

/// Set the audit session state of the calling process (setaudit_addr(2)).
pub fn set_process_info(info: &AuditInfoAddr) -> Result<()> {
    // SAFETY: info is a valid in-pointer and the length matches.
    if unsafe { setaudit_addr(info, size_of::<AuditInfoAddr>() as libc::c_int) } < 0 {
        return Err(Error::auditon("setaudit_addr"));
    }
    Ok(())
}

/// Submit a completed BSM record to the trail (audit(2)).
pub fn submit_record(record: &[u8]) -> Result<()> {
    // SAFETY: record is valid for reads of its length.
    if unsafe { audit(record.as_ptr().cast(), record.len() as libc::c_int) } < 0 {
        return Err(Error::auditon("audit"));
    }
    Ok(())
}

/// Point the kernel at a new trail file (auditctl(2)).
pub fn set_trail(path: &str) -> Result<()> {
    let path = CString::new(path).map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "trail path contains NUL",
        ))
    })?;
    // SAFETY: path is a valid NUL-terminated string.
    if unsafe { auditctl(path.as_ptr()) } < 0 {
        return Err(Error::auditon("auditctl"));
    }
    Ok(())
}

/// Restores the audit policy flags on drop.
#[derive(Debug)]
pub struct PolicyGuard {
    saved: u32,
}

impl PolicyGuard {
    /// Snapshot the current policy.
    pub fn save() -> Result<Self> {
        Ok(Self { saved: policy()? })
    }

    /// The policy value at snapshot time.
    pub fn saved(&self) -> u32 {
        self.saved
    }
}

impl Drop for PolicyGuard {
    fn drop(&mut self) {
        if let Err(err) = set_policy(self.saved) {
            warn!(%err, "failed to restore audit policy");
        }
    }
}

/// Restores the kernel preselection mask on drop.
#[derive(Debug)]
pub struct KernelMaskGuard {
    saved: AuMask,
}

impl KernelMaskGuard {
    /// Snapshot the current kernel mask.
    pub fn save() -> Result<Self> {
        Ok(Self {
            saved: kernel_mask()?,
        })
    }

    /// The mask at snapshot time.
    pub fn saved(&self) -> AuMask {
        self.saved
    }
}

impl Drop for KernelMaskGuard {
    fn drop(&mut self) {
        if let Err(err) = set_kernel_mask(self.saved) {
            warn!(%err, "failed to restore kernel audit mask");
        }
    }
}

/// Restores the kernel audit host information on drop.
#[derive(Debug)]
pub struct KernelInfoGuard {
    saved: AuditInfoAddr,
}

impl KernelInfoGuard {
    /// Snapshot the current host information.
    pub fn save() -> Result<Self> {
        Ok(Self {
            saved: kernel_info()?,
        })
    }

    /// The host information at snapshot time.
    pub fn saved(&self) -> &AuditInfoAddr {
        &self.saved
    }
}

impl Drop for KernelInfoGuard {
    fn drop(&mut self) {
        if let Err(err) = set_kernel_info(&self.saved) {
            warn!(%err, "failed to restore kernel audit host info");
        }
    }
}

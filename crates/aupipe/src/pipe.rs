//! Audit pipe device handle.
//!
//! `/dev/auditpipe` streams a live copy of kernel audit records to user
//! space, independent of the on-disk trail. Each open of the device gets a
//! private queue with its own preselection state, so a test can observe
//! exactly the event classes it cares about without touching the
//! system-wide audit configuration.
//!
//! Reads on the device are record-oriented: one `read(2)` returns one
//! complete BSM record.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::class::AuMask;
use crate::error::{Error, Result};

/// Path of the audit pipe device.
pub const AUDIT_PIPE_PATH: &str = "/dev/auditpipe";

// FreeBSD ioctl request encoding (sys/ioccom.h).
const IOC_VOID: u32 = 0x2000_0000;
const IOC_OUT: u32 = 0x4000_0000;
const IOC_IN: u32 = 0x8000_0000;
const IOCPARM_MASK: u32 = (1 << 13) - 1;

const AUDITPIPE_IOBASE: u32 = b'A' as u32;

const fn ioc(inout: u32, num: u32, len: usize) -> libc::c_ulong {
    (inout | ((len as u32 & IOCPARM_MASK) << 16) | (AUDITPIPE_IOBASE << 8) | num) as libc::c_ulong
}

// Request numbers from security/audit/audit_ioctl.h.
const AUDITPIPE_GET_QLEN: libc::c_ulong = ioc(IOC_OUT, 1, size_of::<libc::c_uint>());
const AUDITPIPE_GET_QLIMIT: libc::c_ulong = ioc(IOC_OUT, 2, size_of::<libc::c_uint>());
const AUDITPIPE_SET_QLIMIT: libc::c_ulong = ioc(IOC_IN, 3, size_of::<libc::c_uint>());
const AUDITPIPE_GET_QLIMIT_MIN: libc::c_ulong = ioc(IOC_OUT, 4, size_of::<libc::c_uint>());
const AUDITPIPE_GET_QLIMIT_MAX: libc::c_ulong = ioc(IOC_OUT, 5, size_of::<libc::c_uint>());
const AUDITPIPE_GET_PRESELECT_FLAGS: libc::c_ulong = ioc(IOC_OUT, 6, size_of::<AuMask>());
const AUDITPIPE_SET_PRESELECT_FLAGS: libc::c_ulong = ioc(IOC_IN, 7, size_of::<AuMask>());
const AUDITPIPE_GET_PRESELECT_NAFLAGS: libc::c_ulong = ioc(IOC_OUT, 8, size_of::<AuMask>());
const AUDITPIPE_SET_PRESELECT_NAFLAGS: libc::c_ulong = ioc(IOC_IN, 9, size_of::<AuMask>());
const AUDITPIPE_GET_PRESELECT_MODE: libc::c_ulong = ioc(IOC_OUT, 14, size_of::<libc::c_int>());
const AUDITPIPE_SET_PRESELECT_MODE: libc::c_ulong = ioc(IOC_IN, 15, size_of::<libc::c_int>());
const AUDITPIPE_FLUSH: libc::c_ulong = ioc(IOC_VOID, 16, 0);
const AUDITPIPE_GET_MAXAUDITDATA: libc::c_ulong = ioc(IOC_OUT, 17, size_of::<libc::c_uint>());

const AUDITPIPE_PRESELECT_MODE_TRAIL: libc::c_int = 1;
const AUDITPIPE_PRESELECT_MODE_LOCAL: libc::c_int = 2;

/// How the pipe decides which records to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreselectMode {
    /// Follow the system-wide trail configuration.
    Trail,
    /// Use the pipe-local preselection masks.
    Local,
}

impl PreselectMode {
    fn to_raw(self) -> libc::c_int {
        match self {
            PreselectMode::Trail => AUDITPIPE_PRESELECT_MODE_TRAIL,
            PreselectMode::Local => AUDITPIPE_PRESELECT_MODE_LOCAL,
        }
    }

    fn from_raw(raw: libc::c_int) -> Result<Self> {
        match raw {
            AUDITPIPE_PRESELECT_MODE_TRAIL => Ok(PreselectMode::Trail),
            AUDITPIPE_PRESELECT_MODE_LOCAL => Ok(PreselectMode::Local),
            other => Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown preselect mode {other}"),
            ))),
        }
    }
}

/// An open audit pipe.
pub struct AuditPipe {
    file: File,
    /// Largest record the kernel will deliver, from AUDITPIPE_GET_MAXAUDITDATA.
    record_cap: usize,
}

impl AuditPipe {
    /// Open `/dev/auditpipe` read-only.
    pub fn open() -> Result<Self> {
        let file = OpenOptions::new().read(true).open(AUDIT_PIPE_PATH)?;
        let mut pipe = Self {
            file,
            record_cap: 0,
        };
        pipe.record_cap = pipe.max_audit_data()? as usize;
        debug!(record_cap = pipe.record_cap, "opened {AUDIT_PIPE_PATH}");
        Ok(pipe)
    }

    /// Apply the local preselection sequence: mode local, flags to `mask`,
    /// then flush anything queued before the mask took effect.
    ///
    /// Idempotent: priming twice with the same mask leaves the same
    /// observable state.
    pub fn prime(&mut self, mask: AuMask) -> Result<()> {
        self.set_preselect_mode(PreselectMode::Local)?;
        self.set_preselect_flags(mask)?;
        self.flush()?;
        debug!(
            success = format_args!("{:#x}", mask.success),
            failure = format_args!("{:#x}", mask.failure),
            "primed audit pipe"
        );
        Ok(())
    }

    /// Number of records currently queued.
    pub fn qlen(&self) -> Result<u32> {
        self.get_uint("AUDITPIPE_GET_QLEN", AUDITPIPE_GET_QLEN)
    }

    /// Current queue limit.
    pub fn qlimit(&self) -> Result<u32> {
        self.get_uint("AUDITPIPE_GET_QLIMIT", AUDITPIPE_GET_QLIMIT)
    }

    /// Set the queue limit. The kernel rejects values outside
    /// [`qlimit_min`](Self::qlimit_min)..=[`qlimit_max`](Self::qlimit_max).
    pub fn set_qlimit(&mut self, limit: u32) -> Result<()> {
        self.set_uint("AUDITPIPE_SET_QLIMIT", AUDITPIPE_SET_QLIMIT, limit)
    }

    /// Smallest accepted queue limit.
    pub fn qlimit_min(&self) -> Result<u32> {
        self.get_uint("AUDITPIPE_GET_QLIMIT_MIN", AUDITPIPE_GET_QLIMIT_MIN)
    }

    /// Largest accepted queue limit.
    pub fn qlimit_max(&self) -> Result<u32> {
        self.get_uint("AUDITPIPE_GET_QLIMIT_MAX", AUDITPIPE_GET_QLIMIT_MAX)
    }

    /// Largest record the kernel will deliver on this pipe.
    pub fn max_audit_data(&self) -> Result<u32> {
        self.get_uint("AUDITPIPE_GET_MAXAUDITDATA", AUDITPIPE_GET_MAXAUDITDATA)
    }

    /// Drop all queued records.
    pub fn flush(&mut self) -> Result<()> {
        // SAFETY: AUDITPIPE_FLUSH takes no argument.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), AUDITPIPE_FLUSH) };
        if ret < 0 {
            return Err(Error::ioctl("AUDITPIPE_FLUSH"));
        }
        Ok(())
    }

    /// Current preselection mode.
    pub fn preselect_mode(&self) -> Result<PreselectMode> {
        let mut raw: libc::c_int = 0;
        // SAFETY: request expects a pointer to c_int.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                AUDITPIPE_GET_PRESELECT_MODE,
                &mut raw,
            )
        };
        if ret < 0 {
            return Err(Error::ioctl("AUDITPIPE_GET_PRESELECT_MODE"));
        }
        PreselectMode::from_raw(raw)
    }

    /// Set the preselection mode.
    pub fn set_preselect_mode(&mut self, mode: PreselectMode) -> Result<()> {
        let raw = mode.to_raw();
        // SAFETY: request expects a pointer to c_int.
        let ret =
            unsafe { libc::ioctl(self.file.as_raw_fd(), AUDITPIPE_SET_PRESELECT_MODE, &raw) };
        if ret < 0 {
            return Err(Error::ioctl("AUDITPIPE_SET_PRESELECT_MODE"));
        }
        Ok(())
    }

    /// Pipe-local preselection mask for attributable events.
    pub fn preselect_flags(&self) -> Result<AuMask> {
        self.get_mask("AUDITPIPE_GET_PRESELECT_FLAGS", AUDITPIPE_GET_PRESELECT_FLAGS)
    }

    /// Set the pipe-local preselection mask for attributable events.
    pub fn set_preselect_flags(&mut self, mask: AuMask) -> Result<()> {
        self.set_mask(
            "AUDITPIPE_SET_PRESELECT_FLAGS",
            AUDITPIPE_SET_PRESELECT_FLAGS,
            mask,
        )
    }

    /// Pipe-local preselection mask for non-attributable events.
    pub fn preselect_naflags(&self) -> Result<AuMask> {
        self.get_mask(
            "AUDITPIPE_GET_PRESELECT_NAFLAGS",
            AUDITPIPE_GET_PRESELECT_NAFLAGS,
        )
    }

    /// Set the pipe-local preselection mask for non-attributable events.
    pub fn set_preselect_naflags(&mut self, mask: AuMask) -> Result<()> {
        self.set_mask(
            "AUDITPIPE_SET_PRESELECT_NAFLAGS",
            AUDITPIPE_SET_PRESELECT_NAFLAGS,
            mask,
        )
    }

    /// Wait for the pipe to become readable.
    ///
    /// Returns `Ok(true)` when a record is ready, `Ok(false)` on timeout.
    /// A poll error or an unexpected `revents` value is an error.
    pub fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let mut fds = [libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];

        // SAFETY: fds points to one valid pollfd for the duration of the call.
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), 1, millis) };
        match ret {
            -1 => Err(Error::Io(io::Error::last_os_error())),
            0 => Ok(false),
            _ => {
                if fds[0].revents & libc::POLLIN != 0 {
                    Ok(true)
                } else {
                    Err(Error::UnexpectedEvent {
                        revents: fds[0].revents,
                    })
                }
            }
        }
    }

    /// Read one raw BSM record.
    ///
    /// Blocks unless the pipe is nonblocking; pair with
    /// [`wait_readable`](Self::wait_readable) for bounded waits.
    pub fn read_record(&self) -> Result<Bytes> {
        Ok(self.try_read_record()?)
    }

    /// `io::Result` flavor of [`read_record`](Self::read_record), usable
    /// inside `AsyncFd::try_io`.
    pub(crate) fn try_read_record(&self) -> io::Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.record_cap.max(512));
        let n = (&self.file).read(&mut buf)?;
        buf.truncate(n);
        trace!(len = n, "read audit record");
        Ok(buf.freeze())
    }

    /// Switch the descriptor between blocking and nonblocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: F_GETFL/F_SETFL on an owned, open descriptor.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        // SAFETY: see above.
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags) };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn get_uint(&self, operation: &'static str, request: libc::c_ulong) -> Result<u32> {
        let mut value: libc::c_uint = 0;
        // SAFETY: request expects a pointer to c_uint.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &mut value) };
        if ret < 0 {
            return Err(Error::ioctl(operation));
        }
        Ok(value)
    }

    fn set_uint(&mut self, operation: &'static str, request: libc::c_ulong, value: u32) -> Result<()> {
        let value: libc::c_uint = value;
        // SAFETY: request expects a pointer to c_uint.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &value) };
        if ret < 0 {
            return Err(Error::ioctl(operation));
        }
        Ok(())
    }

    fn get_mask(&self, operation: &'static str, request: libc::c_ulong) -> Result<AuMask> {
        let mut mask = AuMask::default();
        // SAFETY: request expects a pointer to au_mask_t (two u32s).
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &mut mask) };
        if ret < 0 {
            return Err(Error::ioctl(operation));
        }
        Ok(mask)
    }

    fn set_mask(&mut self, operation: &'static str, request: libc::c_ulong, mask: AuMask) -> Result<()> {
        // SAFETY: request expects a pointer to au_mask_t (two u32s).
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &mask) };
        if ret < 0 {
            return Err(Error::ioctl(operation));
        }
        Ok(())
    }
}

impl AsRawFd for AuditPipe {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

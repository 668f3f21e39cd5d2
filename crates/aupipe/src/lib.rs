//! Live observation of the FreeBSD kernel audit stream.
//!
//! This crate wraps `/dev/auditpipe` for tests and tools that need to
//! assert "this syscall produced that audit record". It covers the full
//! pipe ioctl surface, decodes BSM records into tokens, renders them as
//! single-line text for regex assertions, and manages auditd and global
//! audit state so the host is left as it was found.
//!
//! The typical entry point is [`AuditSession`]: preselect one event
//! class, run the operation under test, then expect a matching record
//! within a bounded deadline.
//!
//! # Features
//!
//! - `stream`: async record tailing via [`stream::RecordStream`].
//! - `output`: `serde::Serialize` on decoded records, for JSON output.
//! - `integration`: enables the root-only integration test suite.

pub mod bsm;
pub mod class;
pub mod daemon;
pub mod error;
pub mod event;
pub mod pipe;
pub mod session;

#[cfg(target_os = "freebsd")]
pub mod auditon;

#[cfg(feature = "stream")]
pub mod stream;

mod parse;

pub use class::{AuMask, AuditClass, ClassTable};
pub use error::{Error, Result};
pub use event::{AuditEvent, EventTable};
pub use pipe::{AuditPipe, PreselectMode, AUDIT_PIPE_PATH};
pub use session::{AuditSession, DEFAULT_TIMEOUT};

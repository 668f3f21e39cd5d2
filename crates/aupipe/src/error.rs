//! Error types for audit pipe operations.

use std::io;
use std::time::Duration;

/// Result type for audit pipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while observing the audit subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from device or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An ioctl on the audit pipe failed.
    #[error("{operation}: {source}")]
    Ioctl {
        /// The ioctl that failed (e.g. "AUDITPIPE_SET_PRESELECT_MODE").
        operation: &'static str,
        /// The underlying system error.
        source: io::Error,
    },

    /// An auditon(2) command failed.
    #[error("auditon {command}: {source}")]
    Auditon {
        /// The command that failed (e.g. "A_SETPOLICY").
        command: &'static str,
        /// The underlying system error.
        source: io::Error,
    },

    /// Audit class mnemonic not present in the class database.
    #[error("audit class not found: {name}")]
    UnknownClass {
        /// The class name that was looked up.
        name: String,
    },

    /// A line of an audit database could not be parsed.
    #[error("{path}:{line}: malformed entry")]
    Database {
        /// Path of the database file.
        path: String,
        /// One-based line number.
        line: usize,
    },

    /// A BSM record ended mid-token or contained an unknown token id.
    #[error("incomplete audit record: token {token:#04x} at offset {offset}")]
    IncompleteRecord {
        /// Byte offset of the offending token within the record.
        offset: usize,
        /// The token id that could not be decoded.
        token: u8,
    },

    /// No matching record arrived before the deadline.
    #[error("no matching audit record within {timeout:?}")]
    Timeout {
        /// The overall deadline that expired.
        timeout: Duration,
    },

    /// poll(2) reported something other than readable data.
    #[error("audit pipe returned an unknown event {revents:#x}")]
    UnexpectedEvent {
        /// The revents bits reported by poll(2).
        revents: i16,
    },

    /// A `service auditd` invocation failed.
    #[error("service command failed: {command}")]
    Service {
        /// The command line that failed.
        command: String,
    },
}

impl Error {
    /// Create an ioctl error from the current `errno`.
    pub(crate) fn ioctl(operation: &'static str) -> Self {
        Self::Ioctl {
            operation,
            source: io::Error::last_os_error(),
        }
    }

    /// Create an auditon error from the current `errno`.
    pub(crate) fn auditon(command: &'static str) -> Self {
        Self::Auditon {
            command,
            source: io::Error::last_os_error(),
        }
    }

    /// Get the errno value if this error wraps a system error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Io(source) | Self::Ioctl { source, .. } | Self::Auditon { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Check if this is the deadline-expiry error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

//! Test-facing audit observation session.
//!
//! A session owns an open audit pipe preselected to one event class, plus
//! the daemon guard and event database needed to decode what arrives. The
//! expected call sequence in a test is:
//!
//! ```no_run
//! use regex::Regex;
//! # fn main() -> aupipe::Result<()> {
//! let mut session = aupipe::AuditSession::begin("fc")?;
//! // perform the syscall under test here
//! let pattern = Regex::new("mkdir.*fileforaudit.*return,success").unwrap();
//! let line = session.expect_record(&pattern)?;
//! println!("{line}");
//! # Ok(())
//! # }
//! ```
//!
//! The session is primed after the daemon is confirmed up and flushed of
//! anything queued beforehand, so a match can only come from a record
//! emitted after `begin` returned.

use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, trace};

use crate::bsm;
use crate::class::ClassTable;
use crate::daemon::{self, AuditdGuard};
use crate::error::{Error, Result};
use crate::event::EventTable;
use crate::pipe::AuditPipe;

/// Default overall wait for a matching record.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Text auditd logs to the audit stream when it comes up.
const STARTUP_MARKER: &str = "audit startup";

/// Monotonic deadline, recomputed on every wait so that time spent
/// decoding non-matching records still counts against the budget.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    end: Instant,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now() + timeout,
        }
    }

    /// Time left, or `None` once expired.
    fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.end {
            None
        } else {
            Some(self.end - now)
        }
    }
}

/// An audit pipe primed for one event class.
pub struct AuditSession {
    pipe: AuditPipe,
    events: EventTable,
    _daemon: AuditdGuard,
    timeout: Duration,
}

impl AuditSession {
    /// Open the pipe, make sure auditd is running, and preselect `class`
    /// (a mnemonic from the class database, e.g. `"fc"`).
    pub fn begin(class: &str) -> Result<Self> {
        Self::begin_with_timeout(class, DEFAULT_TIMEOUT)
    }

    /// [`begin`](Self::begin) with a non-default record deadline.
    pub fn begin_with_timeout(class: &str, timeout: Duration) -> Result<Self> {
        let mask = ClassTable::load()?.resolve(class)?;
        let events = EventTable::load()?;

        // Open before starting the daemon so the startup record lands in
        // this pipe's queue.
        let mut pipe = AuditPipe::open()?;
        let daemon = daemon::ensure_running()?;
        if daemon.started_by_us() {
            let startup = wait_for(&pipe, &events, timeout, |text| {
                text.contains(STARTUP_MARKER)
            })?;
            debug!(record = %startup, "audit startup confirmed");
        }
        pipe.prime(mask)?;

        debug!(class, ?timeout, "audit session ready");
        Ok(Self {
            pipe,
            events,
            _daemon: daemon,
            timeout,
        })
    }

    /// Read records until one renders to a line matching `pattern`,
    /// returning that line.
    ///
    /// Non-matching records are consumed and skipped. Fails with
    /// [`Error::Timeout`] if no match arrives before the session deadline;
    /// a match is only ever reported from an actual decoded record.
    pub fn expect_record(&mut self, pattern: &Regex) -> Result<String> {
        wait_for(&self.pipe, &self.events, self.timeout, |text| {
            pattern.is_match(text)
        })
    }

    /// The underlying pipe, for direct queue control.
    pub fn pipe(&self) -> &AuditPipe {
        &self.pipe
    }

    /// Mutable access to the underlying pipe.
    pub fn pipe_mut(&mut self) -> &mut AuditPipe {
        &mut self.pipe
    }

    /// The loaded event database.
    pub fn events(&self) -> &EventTable {
        &self.events
    }

    /// The configured record deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Poll-decode-match loop shared by startup confirmation and
/// [`AuditSession::expect_record`].
fn wait_for<F>(
    pipe: &AuditPipe,
    events: &EventTable,
    timeout: Duration,
    mut matches: F,
) -> Result<String>
where
    F: FnMut(&str) -> bool,
{
    let deadline = Deadline::after(timeout);
    loop {
        let Some(remaining) = deadline.remaining() else {
            return Err(Error::Timeout { timeout });
        };
        if !pipe.wait_readable(remaining)? {
            return Err(Error::Timeout { timeout });
        }

        let raw = pipe.read_record()?;
        let text = bsm::decode(&raw)?.render(events);
        if matches(&text) {
            return Ok(text);
        }
        trace!(record = %text, "skipped non-matching record");
    }
}

//! Async record stream over the audit pipe.

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::trace;

use crate::bsm::{self, Record};
use crate::error::Result;
use crate::pipe::AuditPipe;

/// Async wrapper yielding decoded records as the kernel emits them.
pub struct RecordStream {
    fd: AsyncFd<AuditPipe>,
}

impl RecordStream {
    /// Take ownership of a pipe and switch it to nonblocking mode.
    pub fn new(pipe: AuditPipe) -> Result<Self> {
        pipe.set_nonblocking(true)?;
        let fd = AsyncFd::with_interest(pipe, Interest::READABLE)?;
        Ok(Self { fd })
    }

    /// Wait for and decode the next record.
    pub async fn next_record(&mut self) -> Result<Record> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| inner.get_ref().try_read_record()) {
                Ok(result) => {
                    let raw = result?;
                    trace!(len = raw.len(), "async record ready");
                    return bsm::decode(&raw);
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Access the underlying pipe, e.g. for queue inspection.
    pub fn pipe(&self) -> &AuditPipe {
        self.fd.get_ref()
    }

    /// Tear down the stream and recover the pipe in blocking mode.
    pub fn into_pipe(self) -> Result<AuditPipe> {
        let pipe = self.fd.into_inner();
        pipe.set_nonblocking(false)?;
        Ok(pipe)
    }
}

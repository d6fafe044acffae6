use std::sync::Mutex;

use objstore_common::StorageResult;

use crate::completion::Tag;

pub(crate) mod direct;
pub(crate) mod range;
pub(crate) mod writer;

/// How the host wants a file opened. Mirrors the harness's per-job
/// read/write/direct flags; exactly one of `read`/`write` must be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    /// Readers only: skip the persistent session and open one fresh
    /// session per submitted operation.
    pub direct: bool,
    /// Writers only: force a flush after every write.
    pub flush_every_write: bool,
}

impl OpenOptions {
    pub fn read(direct: bool) -> Self {
        OpenOptions {
            read: true,
            direct,
            ..Default::default()
        }
    }

    pub fn write(flush_every_write: bool) -> Self {
        OpenOptions {
            write: true,
            flush_every_write,
            ..Default::default()
        }
    }
}

/// Outcome of a submit call, mirroring the host's queue-status contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The operation finished synchronously; no completion record follows.
    Completed,
    /// The operation is in flight; exactly one completion record follows.
    Queued,
    /// The operation failed synchronously; no completion record follows.
    Failed,
}

/// One open file. Each variant supports exactly one of read/write.
pub(crate) enum File {
    /// Byte-range reads over one long-lived session.
    Range(range::RangeFile),
    /// Byte-range reads, one fresh session per operation.
    Direct(direct::DirectFile),
    /// Sequential append writes, performed on the submitting thread.
    Writer(Mutex<writer::WriterFile>),
}

impl File {
    /// Submit one operation. Reader variants return
    /// [`SubmitOutcome::Queued`] immediately and report through the
    /// context's completion channel; the writer completes or fails in
    /// place and never touches the channel.
    pub(crate) fn enqueue(&self, buf: &[u8], offset: u64, tag: Tag) -> SubmitOutcome {
        match self {
            File::Range(f) => f.enqueue(buf.len() as u64, offset, tag),
            File::Direct(f) => f.enqueue(buf.len() as u64, offset, tag),
            // Writes are sequential appends; the host-supplied offset is
            // implied by the session position.
            File::Writer(f) => f.lock().unwrap().enqueue(buf, tag),
        }
    }

    pub(crate) fn close(&self) -> StorageResult<()> {
        match self {
            File::Range(f) => f.close(),
            // No persistent session to release.
            File::Direct(_) => Ok(()),
            File::Writer(f) => f.lock().unwrap().close(),
        }
    }
}

use objstore_common::{AppendSession, StorageResult};
use tracing::error;

use crate::completion::Tag;
use crate::file::SubmitOutcome;

/// Append writer: writes happen synchronously on the submitting thread and
/// failures surface directly from submit, never through the completion
/// channel. Close relies on append semantics alone; there is no separate
/// finalization step.
pub(crate) struct WriterFile {
    session: Box<dyn AppendSession>,
    flush_every_write: bool,
    runtime: tokio::runtime::Handle,
}

impl WriterFile {
    pub(crate) fn new(
        session: Box<dyn AppendSession>,
        flush_every_write: bool,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        WriterFile {
            session,
            flush_every_write,
            runtime,
        }
    }

    pub(crate) fn enqueue(&mut self, buf: &[u8], tag: Tag) -> SubmitOutcome {
        if let Err(err) = self.runtime.block_on(self.session.write(buf)) {
            error!(?tag, %err, "write error");
            return SubmitOutcome::Failed;
        }
        if self.flush_every_write {
            if let Err(err) = self.runtime.block_on(self.session.flush()) {
                error!(?tag, %err, "flush error");
                return SubmitOutcome::Failed;
            }
        }
        SubmitOutcome::Completed
    }

    pub(crate) fn close(&mut self) -> StorageResult<()> {
        self.runtime.block_on(self.session.close())
    }
}

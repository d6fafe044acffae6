use std::sync::Arc;

use objstore_common::{ByteRange, RangeSession, StorageResult};
use tracing::warn;

use crate::completion::{CompletionRecord, CompletionSender, Tag};
use crate::file::SubmitOutcome;

/// Persistent range reader: one download session opened at file open and
/// shared by every submitted operation until close.
pub(crate) struct RangeFile {
    session: Arc<dyn RangeSession>,
    completions: CompletionSender,
    runtime: tokio::runtime::Handle,
}

impl RangeFile {
    pub(crate) fn new(
        session: Arc<dyn RangeSession>,
        completions: CompletionSender,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        RangeFile {
            session,
            completions,
            runtime,
        }
    }

    /// Issues one range read against the open session. The spawned task is
    /// the completion callback: it resolves the read and pushes exactly one
    /// record, in whatever order the backend finishes. A full channel
    /// suspends the task, never the submitting thread.
    pub(crate) fn enqueue(&self, len: u64, offset: u64, tag: Tag) -> SubmitOutcome {
        let session = Arc::clone(&self.session);
        let completions = self.completions.clone();
        self.runtime.spawn(async move {
            let result = session
                .read_range(ByteRange { offset, len })
                .await
                .map(|_bytes| ());
            if completions
                .send(CompletionRecord { tag, result })
                .await
                .is_err()
            {
                // Reap side went away mid-flight: context teardown race.
                warn!(?tag, "dropping completion, channel closed");
            }
        });
        SubmitOutcome::Queued
    }

    pub(crate) fn close(&self) -> StorageResult<()> {
        self.runtime.block_on(self.session.close())
    }
}

use std::sync::Arc;

use objstore_common::{ByteRange, ObjectPath, StorageClient, StorageError};
use tracing::{error, warn};

use crate::completion::{CompletionRecord, CompletionSender, Tag};
use crate::file::SubmitOutcome;

/// Direct range reader: no persistent session. Open stores only the client
/// and the resolved path; every submitted operation is a self-contained
/// unit of work that opens, reads once, and closes.
pub(crate) struct DirectFile {
    client: Arc<dyn StorageClient>,
    path: ObjectPath,
    completions: CompletionSender,
    runtime: tokio::runtime::Handle,
}

impl DirectFile {
    pub(crate) fn new(
        client: Arc<dyn StorageClient>,
        path: ObjectPath,
        completions: CompletionSender,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        DirectFile {
            client,
            path,
            completions,
            runtime,
        }
    }

    /// Exactly one completion record is pushed per call, whichever of the
    /// open/read/close steps fail.
    pub(crate) fn enqueue(&self, len: u64, offset: u64, tag: Tag) -> SubmitOutcome {
        let client = Arc::clone(&self.client);
        let path = self.path.clone();
        let completions = self.completions.clone();
        self.runtime.spawn(async move {
            let result = read_once(client, path, ByteRange { offset, len }).await;
            if completions
                .send(CompletionRecord { tag, result })
                .await
                .is_err()
            {
                warn!(?tag, "dropping completion, channel closed");
            }
        });
        SubmitOutcome::Queued
    }
}

/// Open a fresh session, read one range, close the session. The awaited
/// read future is the operation's single-use completion signal; it
/// resolves exactly once. Read and close failures for the same operation
/// are both reported, as one structured error.
async fn read_once(
    client: Arc<dyn StorageClient>,
    path: ObjectPath,
    range: ByteRange,
) -> Result<(), StorageError> {
    let session = match client.open_range_session(&path).await {
        Ok(session) => session,
        Err(err) => {
            error!(%path, %err, "failed session open for direct read");
            return Err(err);
        }
    };

    let read_result = session.read_range(range).await.map(|_bytes| ());
    match (read_result, session.close().await) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close)) => Err(close),
        (Err(read), Ok(())) => Err(read),
        (Err(read), Err(close)) => Err(StorageError::ReadAndClose {
            read: Box::new(read),
            close: Box::new(close),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    use objstore_common::mem::{MemConnector, MemStore};
    use objstore_common::{ClientOptions, Connect};

    use super::*;

    #[test]
    fn read_and_close_errors_are_both_reported() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/obj").unwrap();
        store.insert(&path, vec![0u8; 128]);
        store.faults.fail_range_read.store(true, Ordering::SeqCst);
        store.faults.fail_range_close.store(true, Ordering::SeqCst);

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let connector = MemConnector::new(store);
        let client = rt
            .block_on(connector.connect(&ClientOptions::default()))
            .unwrap();
        let err = rt
            .block_on(read_once(client, path, ByteRange { offset: 0, len: 16 }))
            .unwrap_err();
        assert!(matches!(err, StorageError::ReadAndClose { .. }));
    }
}

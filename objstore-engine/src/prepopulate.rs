use objstore_common::{AppendOptions, ObjectPath, StorageError, StorageResult};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, error};

use crate::context::ExecutionContext;

const CHUNK: usize = 1 << 20;

/// Current object size, with "does not exist" folded into 0.
async fn object_size_or_zero(ctx: &ExecutionContext, path: &ObjectPath) -> StorageResult<u64> {
    match ctx.client.object_size(path).await {
        Ok(size) => Ok(size),
        Err(StorageError::NotFound(_)) => Ok(0),
        Err(err) => Err(err),
    }
}

/// Idempotent random-content seeding: a no-op if the object already holds
/// at least `target` bytes, otherwise an append of exactly `target` bytes
/// of cryptographically random data through an always-retry writer.
///
/// Runs to completion on the calling thread; there is no cancellation and
/// no retry here beyond the writer's own policy.
pub(crate) fn run(ctx: &ExecutionContext, path: &ObjectPath, target: u64) -> StorageResult<()> {
    ctx.runtime_handle().block_on(async {
        let size = object_size_or_zero(ctx, path).await?;
        if size >= target {
            debug!(%path, size, target, "object already large enough");
            return Ok(());
        }

        let mut session = ctx
            .client
            .open_append_session(path, AppendOptions { always_retry: true })
            .await?;

        let mut chunk = vec![0u8; CHUNK];
        let mut remaining = target;
        while remaining > 0 {
            let n = remaining.min(CHUNK as u64) as usize;
            OsRng.fill_bytes(&mut chunk[..n]);
            if let Err(err) = session.write(&chunk[..n]).await {
                error!(%path, %err, "failed to copy random bytes to writer");
                if let Err(err) = session.close().await {
                    error!(%path, %err, "(expected) failed to close after write failure");
                }
                return Err(err);
            }
            remaining -= n as u64;
        }

        session.close().await
    })
}

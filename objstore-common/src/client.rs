use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::{RetryPredicate, StorageResult};
use crate::path::{ByteRange, ObjectPath};

/// Options for building one backend client.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Override the backend endpoint, e.g. to point at an emulator.
    pub endpoint: Option<String>,
    /// Emit client-side metrics during startup. The engine forces this off;
    /// the telemetry is too verbose for a per-worker client.
    pub client_metrics: bool,
    /// Transient-error classification for the backend's internal retry
    /// loop. The engine installs a default when unset.
    pub retry: Option<RetryPredicate>,
}

/// Options for one append-writer session.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Retry every transient error regardless of the client predicate.
    pub always_retry: bool,
}

/// Builds one client per execution context.
pub trait Connect: Send + Sync {
    fn connect<'a>(
        &'a self,
        opts: &'a ClientOptions,
    ) -> BoxFuture<'a, StorageResult<Arc<dyn StorageClient>>>;
}

/// One backend client: the capability surface the engine consumes.
///
/// A client is exclusively owned by one execution context and is never
/// shared across contexts.
pub trait StorageClient: Send + Sync {
    /// Open a long-lived multi-range read session against one object.
    fn open_range_session<'a>(
        &'a self,
        path: &'a ObjectPath,
    ) -> BoxFuture<'a, StorageResult<Arc<dyn RangeSession>>>;

    /// Open a sequential append-write session against one object.
    fn open_append_session<'a>(
        &'a self,
        path: &'a ObjectPath,
        opts: AppendOptions,
    ) -> BoxFuture<'a, StorageResult<Box<dyn AppendSession>>>;

    /// Current size of the object in bytes. A missing object surfaces as
    /// [`StorageError::NotFound`](crate::StorageError::NotFound).
    fn object_size<'a>(&'a self, path: &'a ObjectPath) -> BoxFuture<'a, StorageResult<u64>>;
}

/// A live multi-range download session.
///
/// Several ranges may be in flight concurrently from independent tasks; the
/// session manages its own internal concurrency. The returned future is the
/// completion signal for that range: it resolves exactly once, after the
/// backend finishes or definitively fails the fetch.
pub trait RangeSession: Send + Sync {
    fn read_range(&self, range: ByteRange) -> BoxFuture<'_, StorageResult<Bytes>>;

    /// Release the session. The engine calls this at most once.
    fn close(&self) -> BoxFuture<'_, StorageResult<()>>;
}

/// A live sequential append session. Writes accumulate in the session until
/// a flush (or close) makes them durable; append semantics only, never
/// truncate-and-rewrite.
pub trait AppendSession: Send {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, StorageResult<usize>>;

    /// Persist buffered bytes; returns the durable object size.
    fn flush(&mut self) -> BoxFuture<'_, StorageResult<u64>>;

    /// Flush outstanding bytes and release the session.
    fn close(&mut self) -> BoxFuture<'_, StorageResult<()>>;
}

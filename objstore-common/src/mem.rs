//! In-memory storage backend with fault injection.
//!
//! Backs engine tests and host dry runs: one [`MemStore`] shared by every
//! client a [`MemConnector`] hands out, plus counters and failure toggles
//! the test flips between calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::client::{
    AppendOptions, AppendSession, ClientOptions, Connect, RangeSession, StorageClient,
};
use crate::error::{default_retry_predicate, RetryPredicate, StorageError, StorageResult};
use crate::path::{ByteRange, ObjectPath};

/// Failure toggles, checked at the operation they name.
#[derive(Default)]
pub struct Faults {
    pub fail_range_open: AtomicBool,
    pub fail_range_read: AtomicBool,
    pub fail_range_close: AtomicBool,
    pub fail_write: AtomicBool,
    pub fail_flush: AtomicBool,
    /// Park range reads forever instead of resolving them.
    pub hang_range_read: AtomicBool,
    /// Number of transient `Unavailable` read failures to inject before
    /// reads succeed again; exercises the client retry predicate.
    pub transient_read_failures: AtomicU32,
}

#[derive(Default)]
pub struct Stats {
    pub range_sessions_opened: AtomicUsize,
    pub append_sessions_opened: AtomicUsize,
    pub ranges_read: AtomicUsize,
    pub bytes_written: AtomicU64,
}

/// Shared object store state: `(bucket, object) -> content`.
#[derive(Default)]
pub struct MemStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub faults: Faults,
    pub stats: Stats,
}

fn key(path: &ObjectPath) -> (String, String) {
    (path.bucket().to_owned(), path.object().to_owned())
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, path: &ObjectPath, content: Vec<u8>) {
        self.objects.lock().unwrap().insert(key(path), content);
    }

    pub fn object(&self, path: &ObjectPath) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(&key(path)).cloned()
    }

    pub fn object_len(&self, path: &ObjectPath) -> Option<usize> {
        self.objects.lock().unwrap().get(&key(path)).map(Vec::len)
    }

    fn append(&self, path: &ObjectPath, data: &[u8]) {
        let mut objects = self.objects.lock().unwrap();
        objects.entry(key(path)).or_default().extend_from_slice(data);
    }

    /// Bytes of `range` that exist, truncated at the object's end.
    fn read(&self, path: &ObjectPath, range: ByteRange) -> StorageResult<Bytes> {
        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(&key(path))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let start = range.offset.min(data.len() as u64) as usize;
        let end = range.end().min(data.len() as u64) as usize;
        Ok(Bytes::copy_from_slice(&data[start..end]))
    }
}

/// Connector handing out clients that all share one [`MemStore`].
pub struct MemConnector {
    store: Arc<MemStore>,
}

impl MemConnector {
    pub fn new(store: Arc<MemStore>) -> Self {
        MemConnector { store }
    }
}

impl Connect for MemConnector {
    fn connect<'a>(
        &'a self,
        opts: &'a ClientOptions,
    ) -> BoxFuture<'a, StorageResult<Arc<dyn StorageClient>>> {
        let client: Arc<dyn StorageClient> = Arc::new(MemClient {
            store: Arc::clone(&self.store),
            retry: opts.retry.clone().unwrap_or_else(default_retry_predicate),
        });
        async move { Ok(client) }.boxed()
    }
}

pub struct MemClient {
    store: Arc<MemStore>,
    retry: RetryPredicate,
}

impl StorageClient for MemClient {
    fn open_range_session<'a>(
        &'a self,
        path: &'a ObjectPath,
    ) -> BoxFuture<'a, StorageResult<Arc<dyn RangeSession>>> {
        async move {
            if self.store.faults.fail_range_open.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected range open failure".into()));
            }
            self.store
                .stats
                .range_sessions_opened
                .fetch_add(1, Ordering::SeqCst);
            let session: Arc<dyn RangeSession> = Arc::new(MemRangeSession {
                store: Arc::clone(&self.store),
                retry: Arc::clone(&self.retry),
                path: path.clone(),
                closed: AtomicBool::new(false),
            });
            Ok(session)
        }
        .boxed()
    }

    fn open_append_session<'a>(
        &'a self,
        path: &'a ObjectPath,
        opts: AppendOptions,
    ) -> BoxFuture<'a, StorageResult<Box<dyn AppendSession>>> {
        async move {
            self.store
                .stats
                .append_sessions_opened
                .fetch_add(1, Ordering::SeqCst);
            tracing::debug!(%path, always_retry = opts.always_retry, "append session opened");
            let session: Box<dyn AppendSession> = Box::new(MemAppendSession {
                store: Arc::clone(&self.store),
                path: path.clone(),
                pending: Vec::new(),
                closed: false,
            });
            Ok(session)
        }
        .boxed()
    }

    fn object_size<'a>(&'a self, path: &'a ObjectPath) -> BoxFuture<'a, StorageResult<u64>> {
        async move {
            match self.store.object_len(path) {
                Some(len) => Ok(len as u64),
                None => Err(StorageError::NotFound(path.to_string())),
            }
        }
        .boxed()
    }
}

struct MemRangeSession {
    store: Arc<MemStore>,
    retry: RetryPredicate,
    path: ObjectPath,
    closed: AtomicBool,
}

impl MemRangeSession {
    fn attempt(&self, range: ByteRange) -> StorageResult<Bytes> {
        let faults = &self.store.faults;
        if faults.transient_read_failures.load(Ordering::SeqCst) > 0 {
            faults.transient_read_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(
                "injected transient read failure".into(),
            ));
        }
        if faults.fail_range_read.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected read failure".into()));
        }
        self.store.stats.ranges_read.fetch_add(1, Ordering::SeqCst);
        self.store.read(&self.path, range)
    }
}

impl RangeSession for MemRangeSession {
    fn read_range(&self, range: ByteRange) -> BoxFuture<'_, StorageResult<Bytes>> {
        async move {
            if self.store.faults.hang_range_read.load(Ordering::SeqCst) {
                futures::future::pending::<()>().await;
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(StorageError::SessionClosed);
            }
            // The backend-internal retry loop: transient errors are retried
            // for as long as the installed predicate says so.
            loop {
                match self.attempt(range) {
                    Ok(bytes) => return Ok(bytes),
                    Err(err) if (self.retry)(&err) => continue,
                    Err(err) => return Err(err),
                }
            }
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, StorageResult<()>> {
        async move {
            self.closed.store(true, Ordering::SeqCst);
            if self.store.faults.fail_range_close.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected close failure".into()));
            }
            Ok(())
        }
        .boxed()
    }
}

struct MemAppendSession {
    store: Arc<MemStore>,
    path: ObjectPath,
    pending: Vec<u8>,
    closed: bool,
}

impl MemAppendSession {
    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.store.append(&self.path, &self.pending);
        self.store
            .stats
            .bytes_written
            .fetch_add(self.pending.len() as u64, Ordering::SeqCst);
        self.pending.clear();
    }
}

impl AppendSession for MemAppendSession {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, StorageResult<usize>> {
        async move {
            if self.closed {
                return Err(StorageError::SessionClosed);
            }
            if self.store.faults.fail_write.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected write failure".into()));
            }
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }
        .boxed()
    }

    fn flush(&mut self) -> BoxFuture<'_, StorageResult<u64>> {
        async move {
            if self.closed {
                return Err(StorageError::SessionClosed);
            }
            if self.store.faults.fail_flush.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected flush failure".into()));
            }
            self.commit();
            Ok(self.store.object_len(&self.path).unwrap_or(0) as u64)
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, StorageResult<()>> {
        async move {
            if self.closed {
                return Err(StorageError::SessionClosed);
            }
            if !self.pending.is_empty() && self.store.faults.fail_flush.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected flush failure".into()));
            }
            self.closed = true;
            self.commit();
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    fn client_with(
        store: &Arc<MemStore>,
        opts: ClientOptions,
    ) -> Arc<dyn StorageClient> {
        rt().block_on(MemConnector::new(Arc::clone(store)).connect(&opts))
            .unwrap()
    }

    #[test]
    fn transient_failures_are_retried_per_predicate() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/obj").unwrap();
        store.insert(&path, vec![42u8; 256]);
        store.faults.transient_read_failures.store(3, Ordering::SeqCst);

        let client = client_with(&store, ClientOptions::default());
        let rt = rt();
        let session = rt.block_on(client.open_range_session(&path)).unwrap();
        let bytes = rt
            .block_on(session.read_range(ByteRange { offset: 0, len: 16 }))
            .unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(store.faults.transient_read_failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn never_retry_predicate_surfaces_transient_errors() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/obj").unwrap();
        store.insert(&path, vec![42u8; 256]);
        store.faults.transient_read_failures.store(1, Ordering::SeqCst);

        let opts = ClientOptions {
            retry: Some(Arc::new(|_| false)),
            ..Default::default()
        };
        let client = client_with(&store, opts);
        let rt = rt();
        let session = rt.block_on(client.open_range_session(&path)).unwrap();
        let err = rt
            .block_on(session.read_range(ByteRange { offset: 0, len: 16 }))
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn reads_truncate_at_object_end() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/obj").unwrap();
        store.insert(&path, vec![7u8; 100]);

        let client = client_with(&store, ClientOptions::default());
        let rt = rt();
        let session = rt.block_on(client.open_range_session(&path)).unwrap();
        let bytes = rt
            .block_on(session.read_range(ByteRange { offset: 90, len: 64 }))
            .unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn append_session_buffers_until_flush() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/obj").unwrap();
        let client = client_with(&store, ClientOptions::default());
        let rt = rt();

        let mut session = rt
            .block_on(client.open_append_session(&path, AppendOptions::default()))
            .unwrap();
        rt.block_on(session.write(b"hello ")).unwrap();
        rt.block_on(session.write(b"world")).unwrap();
        assert_eq!(store.object_len(&path), None, "nothing durable before flush");

        let size = rt.block_on(session.flush()).unwrap();
        assert_eq!(size, 11);
        assert_eq!(store.object(&path).unwrap(), b"hello world");

        rt.block_on(session.close()).unwrap();
        assert!(rt.block_on(session.write(b"x")).is_err());
    }

    #[test]
    fn missing_objects_report_not_found_size() {
        let store = MemStore::new();
        let path = ObjectPath::from_str("bucket/missing").unwrap();
        let client = client_with(&store, ClientOptions::default());
        let err = rt().block_on(client.object_size(&path)).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}

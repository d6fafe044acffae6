use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use objstore_common::{AppendOptions, ClientOptions, Connect, ObjectPath};
use tracing::{debug, error, info};

use crate::completion::Tag;
use crate::context::ExecutionContext;
use crate::file::direct::DirectFile;
use crate::file::range::RangeFile;
use crate::file::writer::WriterFile;
use crate::file::{File, OpenOptions, SubmitOutcome};
use crate::registry::{Handle, Registry};


/// The narrow call surface the host harness drives.
///
/// One engine per host process. Contexts hang off it, one per worker
/// thread; files hang off contexts. All handle-returning calls use `None`
/// as the construction-failure sentinel and register nothing on failure.
pub struct Engine {
    registry: Registry,
    connector: Arc<dyn Connect>,
}

/// Failure from [`Engine::await_completions`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("handle {0} is not a live execution context")]
    InvalidContext(Handle),
}

/// One reaped completion. The tag comes back even on failure so the host
/// can attribute the error to the right in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaped {
    Completed(Tag),
    Failed(Tag),
}

impl Engine {
    pub fn new(connector: Arc<dyn Connect>) -> Self {
        Engine {
            registry: Registry::new(),
            connector,
        }
    }

    /// Create one execution context: a backend client, a bounded completion
    /// channel of capacity `depth`, and an empty reap buffer.
    pub fn create_context(&self, depth: usize, opts: ClientOptions) -> Option<Handle> {
        debug!(depth, "create context");
        match ExecutionContext::create(self.connector.as_ref(), depth, opts) {
            Ok(ctx) => Some(self.registry.register_context(ctx)),
            Err(err) => {
                error!(%err, "failed context creation");
                None
            }
        }
    }

    /// Deregister and discard a context. In-flight operations are aborted,
    /// not drained; the host accounts all operations per file before
    /// tearing the context down. Never blocks.
    pub fn destroy_context(&self, handle: Handle) {
        let Some(ctx) = self.registry.context(handle) else {
            error!(%handle, "teardown: not a live context handle");
            return;
        };
        self.registry.remove(handle);
        ctx.teardown();
    }

    /// Open `path` under `ctx`. Mode validation happens before any backend
    /// call: exactly one of `read`/`write` must be set.
    pub fn open_file(&self, ctx: Handle, opts: OpenOptions, path: &str) -> Option<Handle> {
        debug!(%ctx, ?opts, path, "open file");
        if opts.read == opts.write {
            error!(path, "open supports readonly or writeonly files, not both or neither");
            return None;
        }
        let context = self.registry.context(ctx)?;
        let object = match ObjectPath::from_str(path) {
            Ok(object) => object,
            Err(err) => {
                error!(%err, "open: bad object path");
                return None;
            }
        };

        let runtime = context.runtime_handle();
        let file = if opts.read {
            if opts.direct {
                // No backend call yet: sessions are opened per operation.
                File::Direct(DirectFile::new(
                    Arc::clone(&context.client),
                    object,
                    context.completions_tx.clone(),
                    runtime,
                ))
            } else {
                let session = match runtime.block_on(context.client.open_range_session(&object))
                {
                    Ok(session) => session,
                    Err(err) => {
                        error!(path, %err, "failed range session open");
                        return None;
                    }
                };
                File::Range(RangeFile::new(
                    session,
                    context.completions_tx.clone(),
                    runtime,
                ))
            }
        } else {
            let session = match runtime.block_on(
                context
                    .client
                    .open_append_session(&object, AppendOptions { always_retry: true }),
            ) {
                Ok(session) => session,
                Err(err) => {
                    error!(path, %err, "failed append session open");
                    return None;
                }
            };
            File::Writer(Mutex::new(WriterFile::new(
                session,
                opts.flush_every_write,
                runtime,
            )))
        };
        Some(self.registry.register_file(Arc::new(file)))
    }

    pub fn open_read(&self, ctx: Handle, direct: bool, path: &str) -> Option<Handle> {
        self.open_file(ctx, OpenOptions::read(direct), path)
    }

    pub fn open_write(&self, ctx: Handle, flush_every_write: bool, path: &str) -> Option<Handle> {
        self.open_file(ctx, OpenOptions::write(flush_every_write), path)
    }

    /// Close and deregister a file. Close errors are logged and swallowed;
    /// the handle is gone either way.
    pub fn close_file(&self, handle: Handle) -> bool {
        debug!(%handle, "close file");
        let Some(file) = self.registry.file(handle) else {
            return false;
        };
        self.registry.remove(handle);
        if let Err(err) = file.close() {
            error!(%handle, %err, "close error (swallowing)");
        }
        true
    }

    /// Submit one byte-range operation against an open file.
    ///
    /// Reader files return [`SubmitOutcome::Queued`] immediately and report
    /// through [`Self::await_completions`] / [`Self::reap_one`]; the writer
    /// completes or fails in place. A bad file handle is a submission-time
    /// rejection: `Failed`, with the completion channel untouched.
    pub fn submit(&self, file: Handle, tag: Tag, offset: u64, buf: &[u8]) -> SubmitOutcome {
        let Some(file) = self.registry.file(file) else {
            return SubmitOutcome::Failed;
        };
        file.enqueue(buf, offset, tag)
    }

    /// Block until at least `min` completion records are reaped, then keep
    /// draining without blocking until the channel is empty or `max`
    /// records are held. Returns the reap buffer size.
    ///
    /// `wait` is accepted for surface compatibility with the host's
    /// getevents contract but is intentionally not enforced: if `min` is
    /// never satisfied this call blocks forever. Hosts must bound their
    /// outstanding submissions instead.
    pub fn await_completions(
        &self,
        ctx: Handle,
        min: usize,
        max: usize,
        wait: Option<Duration>,
    ) -> Result<usize, EngineError> {
        debug!(%ctx, min, max, ?wait, "await completions");
        let context = self
            .registry
            .context(ctx)
            .ok_or(EngineError::InvalidContext(ctx))?;
        let mut reap = context.reap.lock().unwrap();
        Ok(reap.fill(min, max))
    }

    /// Pop one reaped completion, most recent first (LIFO). `None` when
    /// the handle is invalid or the reap buffer is empty (caller misuse).
    pub fn reap_one(&self, ctx: Handle) -> Option<Reaped> {
        let context = self.registry.context(ctx)?;
        let mut reap = context.reap.lock().unwrap();
        let Some(record) = reap.pop() else {
            error!(%ctx, "reap: no reaped completions");
            return None;
        };
        match record.result {
            Ok(()) => Some(Reaped::Completed(record.tag)),
            Err(err) => {
                error!(%ctx, %err, "reaped completion error");
                Some(Reaped::Failed(record.tag))
            }
        }
    }

    /// Seed `path` with `target_size` bytes of random content unless the
    /// object is already at least that large. Idempotent; not cancellable.
    pub fn prepopulate(&self, ctx: Handle, path: &str, target_size: u64) -> bool {
        info!(%ctx, path, target_size, "prepopulate");
        let Some(context) = self.registry.context(ctx) else {
            return false;
        };
        let object = match ObjectPath::from_str(path) {
            Ok(object) => object,
            Err(err) => {
                error!(%err, "prepopulate: bad object path");
                return false;
            }
        };
        match crate::prepopulate::run(&context, &object, target_size) {
            Ok(()) => true,
            Err(err) => {
                error!(path, %err, "prepopulate failed");
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.registry.len()
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use objstore_common::{default_retry_predicate, ClientOptions, Connect, StorageClient};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::completion::{CompletionSender, ReapSide};

static CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Per-worker-thread owner of one backend client, one bounded completion
/// channel, and the reap buffer.
///
/// Contexts are fully independent: each has its own client and its own
/// two-worker runtime, and nothing is shared between contexts. The host
/// guarantees a context is driven by exactly one worker thread at a time.
pub(crate) struct ExecutionContext {
    pub(crate) id: usize,
    pub(crate) client: Arc<dyn StorageClient>,
    /// Drives reader producer tasks and the synchronous bridge
    /// (`Handle::block_on`) for open/write/flush/close and prepopulation.
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
    pub(crate) completions_tx: CompletionSender,
    pub(crate) reap: Mutex<ReapSide>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ContextCreateError {
    #[error("completion depth must be at least 1")]
    ZeroDepth,
    #[error("failed to build context runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed client creation: {0}")]
    Connect(objstore_common::StorageError),
}

impl ExecutionContext {
    /// Builds the runtime, connects the backend client, and wires the
    /// completion channel. `depth` is the channel capacity: producers that
    /// would overrun it block until the worker reaps.
    ///
    /// On error nothing is retained; the caller registers nothing.
    pub(crate) fn create(
        connector: &dyn Connect,
        depth: usize,
        mut opts: ClientOptions,
    ) -> Result<Arc<Self>, ContextCreateError> {
        if depth == 0 {
            return Err(ContextCreateError::ZeroDepth);
        }
        let id = CONTEXT_ID.fetch_add(1, Ordering::Relaxed);

        // Startup telemetry is too verbose for a per-worker client. The
        // transient predicate is installed once here and reused by every
        // operation issued through this client, prepopulation included.
        opts.client_metrics = false;
        if opts.retry.is_none() {
            opts.retry = Some(default_retry_predicate());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name(format!("objstore-ctx-{id}"))
            .enable_all()
            .build()
            .map_err(ContextCreateError::Runtime)?;

        let client = runtime
            .block_on(connector.connect(&opts))
            .map_err(ContextCreateError::Connect)?;

        let (tx, rx) = mpsc::channel(depth);
        info!(ctx = id, depth, endpoint = ?opts.endpoint, "execution context created");
        Ok(Arc::new(ExecutionContext {
            id,
            client,
            runtime: Mutex::new(Some(runtime)),
            completions_tx: tx,
            reap: Mutex::new(ReapSide::new(rx, depth)),
        }))
    }

    /// Handle for spawning producer tasks and for `block_on` bridging.
    pub(crate) fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.runtime
            .lock()
            .unwrap()
            .as_ref()
            .expect("runtime is taken only at teardown")
            .handle()
            .clone()
    }

    /// Tear the context down without draining: still-running producer
    /// tasks are aborted, so an operation whose completion races teardown
    /// is dropped rather than left blocked on a channel nobody reads.
    /// Never blocks the calling thread.
    pub(crate) fn teardown(&self) {
        let id = self.id;
        info!(ctx = id, "execution context teardown");
        scopeguard::defer_on_success! { debug!(ctx = id, "context teardown end") };
        scopeguard::defer_on_unwind! { error!(ctx = id, "context teardown panic") };
        match self.runtime.lock().unwrap().take() {
            Some(runtime) => runtime.shutdown_background(),
            None => error!(ctx = id, "context torn down twice"),
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        // Covers contexts discarded without an explicit teardown; a plain
        // runtime drop could block on in-flight producer tasks.
        if let Some(runtime) = self.runtime.get_mut().unwrap().take() {
            runtime.shutdown_background();
        }
    }
}

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::context::ExecutionContext;
use crate::file::File;

/// Opaque identifier the host holds instead of a pointer.
///
/// The original engine handed raw registry keys across an FFI boundary and
/// reserved zero for "no object"; here the sentinel is `Option<Handle>` and
/// the zero value is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

pub(crate) enum Entry {
    Context(Arc<ExecutionContext>),
    File(Arc<File>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Context(_) => "context",
            Entry::File(_) => "file",
        }
    }
}

/// Maps live handles to their objects.
///
/// A handle value is never reused: allocation is a monotonic counter
/// starting at 1. Typed lookup of a live handle of the wrong kind is a
/// distinct failure with no side effects.
pub(crate) struct Registry {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, entry: Entry) -> Handle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = Handle(NonZeroU64::new(id).expect("allocation starts at 1 and only grows"));
        let prev = self.entries.lock().unwrap().insert(id, entry);
        assert!(prev.is_none(), "handle {id} allocated twice");
        handle
    }

    pub(crate) fn register_context(&self, ctx: Arc<ExecutionContext>) -> Handle {
        self.insert(Entry::Context(ctx))
    }

    pub(crate) fn register_file(&self, file: Arc<File>) -> Handle {
        self.insert(Entry::File(file))
    }

    pub(crate) fn context(&self, handle: Handle) -> Option<Arc<ExecutionContext>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&handle.get()) {
            Some(Entry::Context(ctx)) => Some(Arc::clone(ctx)),
            Some(other) => {
                error!(%handle, kind = other.kind(), "handle is not a context");
                None
            }
            None => {
                error!(%handle, "handle not registered");
                None
            }
        }
    }

    pub(crate) fn file(&self, handle: Handle) -> Option<Arc<File>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&handle.get()) {
            Some(Entry::File(file)) => Some(Arc::clone(file)),
            Some(other) => {
                error!(%handle, kind = other.kind(), "handle is not a file");
                None
            }
            None => {
                error!(%handle, "handle not registered");
                None
            }
        }
    }

    pub(crate) fn remove(&self, handle: Handle) -> Option<Entry> {
        self.entries.lock().unwrap().remove(&handle.get())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

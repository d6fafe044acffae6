use std::sync::Arc;

/// Errors surfaced by a storage backend at this crate's boundary.
///
/// Backends run their own retry loop, steered by the [`RetryPredicate`]
/// installed at client construction; an error observed here has already
/// survived that retrying.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object {0} does not exist")]
    NotFound(String),

    #[error("could not extract bucket from path {0:?}")]
    InvalidPath(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend deadline exceeded: {0}")]
    Timeout(String),

    #[error("session already closed")]
    SessionClosed,

    /// A read and the subsequent session close failed for the same
    /// operation. Both causes stay inspectable.
    #[error("read error: {read}; close error: {close}")]
    ReadAndClose {
        read: Box<StorageError>,
        close: Box<StorageError>,
    },

    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the backend may transparently retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Timeout(_)
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Classification function deciding whether a given backend error is
/// retried inside the backend. Installed once per client and reused by
/// every operation issued through that client.
pub type RetryPredicate = Arc<dyn Fn(&StorageError) -> bool + Send + Sync>;

/// Default classification: retry exactly the transient kinds.
pub fn default_retry_predicate() -> RetryPredicate {
    Arc::new(|err| {
        let retry = err.is_transient();
        tracing::debug!(%err, retry, "retry classification");
        retry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(StorageError::Unavailable("conn reset".into()).is_transient());
        assert!(StorageError::Timeout("deadline".into()).is_transient());
        assert!(!StorageError::NotFound("b/o".into()).is_transient());
        assert!(!StorageError::PermissionDenied("denied".into()).is_transient());
        assert!(!StorageError::InvalidPath("x".into()).is_transient());
        assert!(!StorageError::SessionClosed.is_transient());
    }

    #[test]
    fn default_predicate_follows_transience() {
        let retry = default_retry_predicate();
        assert!(retry(&StorageError::Unavailable("".into())));
        assert!(!retry(&StorageError::Backend("checksum mismatch".into())));
    }

    #[test]
    fn combined_error_renders_both_causes() {
        let err = StorageError::ReadAndClose {
            read: Box::new(StorageError::Unavailable("reset".into())),
            close: Box::new(StorageError::Backend("stream broken".into())),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("read error:"));
        assert!(rendered.contains("close error:"));
    }
}

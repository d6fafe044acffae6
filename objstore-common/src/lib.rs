//! Capability surface for remote object storage, as consumed by
//! `objstore-engine`: object paths, byte ranges, the error taxonomy with its
//! transient-retry classification, and the client/session traits.
//!
//! This crate never speaks a wire protocol. Hosts supply a [`Connect`]
//! implementation for the real backend; the backend owns authentication and
//! its internal retry loop, classified by the [`RetryPredicate`] installed
//! at client construction. The `mem` feature provides an in-memory
//! implementation with fault injection for tests and dry runs.

mod client;
mod error;
#[cfg(feature = "mem")]
pub mod mem;
mod path;

pub use client::{
    AppendOptions, AppendSession, ClientOptions, Connect, RangeSession, StorageClient,
};
pub use error::{default_retry_predicate, RetryPredicate, StorageError, StorageResult};
pub use path::{ByteRange, ObjectPath};

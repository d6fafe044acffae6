//! Bridge between a synchronous, poll-based I/O host and an asynchronous
//! remote object-storage backend.
//!
//! The host owns thread lifecycle and drives a narrow surface on
//! [`Engine`]: create one execution context per worker thread, open files,
//! submit byte-range operations, then await and reap completions until
//! every operation for a file is accounted for, close the file, and
//! eventually tear the context down.
//!
//! Readers report asynchronously: each submitted range becomes a task on
//! the context's runtime whose single result is pushed through the
//! context's bounded completion channel. The channel capacity equals the
//! configured outstanding-operations depth, so a producer that would
//! overrun it suspends until the worker reaps. Writers complete or fail
//! synchronously from [`Engine::submit`] and never touch the channel.

mod completion;
mod context;
mod engine;
mod file;
mod prepopulate;
mod registry;

pub use completion::Tag;
pub use engine::{Engine, EngineError, Reaped};
pub use file::{OpenOptions, SubmitOutcome};
pub use registry::Handle;

use objstore_common::StorageError;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Opaque cookie the host attaches to each submitted operation. It
/// identifies the in-flight request on the host side and is returned
/// verbatim when the completion is reaped, error or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(pub u64);

/// Produced exactly once per asynchronous operation.
pub(crate) struct CompletionRecord {
    pub(crate) tag: Tag,
    pub(crate) result: Result<(), StorageError>,
}

pub(crate) type CompletionSender = mpsc::Sender<CompletionRecord>;

/// Consumer half of a context's completion channel plus its reap buffer.
///
/// Only the context's owning worker thread touches this (host contract),
/// so the lock around it is uncontended. The producer side is genuinely
/// concurrent: reader tasks push records from the context runtime, and a
/// full channel suspends them until the worker reaps.
pub(crate) struct ReapSide {
    rx: mpsc::Receiver<CompletionRecord>,
    reaped: Vec<CompletionRecord>,
}

impl ReapSide {
    pub(crate) fn new(rx: mpsc::Receiver<CompletionRecord>, depth: usize) -> Self {
        ReapSide {
            rx,
            reaped: Vec::with_capacity(depth),
        }
    }

    /// Blocks until the reap buffer holds at least `min` records, then
    /// drains without blocking until the channel is empty or the buffer
    /// holds `max`. Returns the buffer size.
    ///
    /// The blocking phase is unbounded and parks the calling worker thread
    /// only.
    pub(crate) fn fill(&mut self, min: usize, max: usize) -> usize {
        while self.reaped.len() < min {
            trace!(remaining = min - self.reaped.len(), "waiting for min completions");
            match self.rx.blocking_recv() {
                Some(record) => self.reaped.push(record),
                // Every producer is gone; nothing further can arrive.
                None => break,
            }
        }
        while self.reaped.len() < max {
            match self.rx.try_recv() {
                Ok(record) => self.reaped.push(record),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
        debug!(reaped = self.reaped.len(), "reap buffer filled");
        self.reaped.len()
    }

    /// Pops the most recently reaped record first (LIFO). Submission order
    /// is not preserved anywhere on this path.
    pub(crate) fn pop(&mut self) -> Option<CompletionRecord> {
        self.reaped.pop()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn record(tag: u64) -> CompletionRecord {
        CompletionRecord {
            tag: Tag(tag),
            result: Ok(()),
        }
    }

    #[test]
    fn pops_most_recent_first() {
        let (tx, rx) = mpsc::channel(4);
        let mut reap = ReapSide::new(rx, 4);
        for t in [1, 2, 3] {
            tx.blocking_send(record(t)).unwrap();
        }
        assert_eq!(reap.fill(3, 4), 3);
        let popped: Vec<u64> = std::iter::from_fn(|| reap.pop()).map(|r| r.tag.0).collect();
        assert_eq!(popped, vec![3, 2, 1]);
    }

    #[test]
    fn max_phase_stops_at_empty_channel() {
        let (tx, rx) = mpsc::channel(8);
        let mut reap = ReapSide::new(rx, 8);
        tx.blocking_send(record(1)).unwrap();
        assert_eq!(reap.fill(0, 8), 1);
        assert_eq!(reap.fill(0, 8), 1, "nothing new to drain");
        assert_eq!(reap.pop().unwrap().tag, Tag(1));
        assert!(reap.pop().is_none());
    }

    #[test]
    fn min_phase_blocks_until_a_producer_delivers() {
        let (tx, rx) = mpsc::channel(2);
        let mut reap = ReapSide::new(rx, 2);
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.blocking_send(record(7)).unwrap();
        });
        assert_eq!(reap.fill(1, 2), 1);
        producer.join().unwrap();
        assert_eq!(reap.pop().unwrap().tag, Tag(7));
    }
}

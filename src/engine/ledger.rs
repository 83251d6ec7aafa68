//! engine::ledger
//!
//! Bounded in-memory log of finished transactions.
//!
//! The coordinator appends one [`TransactionRecord`] per transaction, after
//! the lock is released. The ledger is evidence only: it records what the
//! coordinator did and when, so operators (and tests) can check that
//! transactions never overlapped and see which ones committed or pushed.
//!
//! # Example
//!
//! ```
//! use fleetconf::engine::ledger::{Outcome, TransactionLedger};
//! use std::time::Instant;
//!
//! let ledger = TransactionLedger::with_capacity(2);
//! let start = Instant::now();
//! ledger.record(start, Instant::now(), Outcome::Committed { pushed: true });
//! ledger.record(start, Instant::now(), Outcome::ReadOnly);
//! ledger.record(start, Instant::now(), Outcome::Failed);
//!
//! let records = ledger.records();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].seq, 2);
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 256;

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was committed and no refs moved.
    ReadOnly,
    /// Refs moved; `pushed` tells whether a push was attempted.
    Committed { pushed: bool },
    /// The unit of work returned an error.
    Failed,
}

/// One finished transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// When the lock was acquired.
    pub started: Instant,
    /// When the transaction finished, before the lock was released.
    pub finished: Instant,
    pub outcome: Outcome,
}

impl TransactionRecord {
    /// Whether the two records' lock windows intersect.
    pub fn overlaps(&self, other: &TransactionRecord) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

#[derive(Debug)]
struct Inner {
    next_seq: u64,
    records: VecDeque<TransactionRecord>,
}

/// Thread-safe ring buffer of [`TransactionRecord`]s.
#[derive(Debug)]
pub struct TransactionLedger {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TransactionLedger {
    /// Ledger keeping at most `capacity` records (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                next_seq: 1,
                records: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// Append a record, evicting the oldest when full. Returns its sequence number.
    pub fn record(&self, started: Instant, finished: Instant, outcome: Outcome) -> u64 {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.records.len() == self.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(TransactionRecord {
            seq,
            started,
            finished,
            outcome,
        });
        seq
    }

    /// Snapshot of the retained records, oldest first.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.inner.lock().records.iter().cloned().collect()
    }

    /// Total number of transactions recorded, including evicted ones.
    pub fn total(&self) -> u64 {
        self.inner.lock().next_seq - 1
    }

    pub fn last(&self) -> Option<TransactionRecord> {
        self.inner.lock().records.back().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sequence_numbers_are_monotonic() {
        let ledger = TransactionLedger::default();
        let now = Instant::now();
        assert_eq!(ledger.record(now, now, Outcome::ReadOnly), 1);
        assert_eq!(ledger.record(now, now, Outcome::Failed), 2);
        assert_eq!(ledger.total(), 2);
        assert_eq!(ledger.last().map(|r| r.outcome), Some(Outcome::Failed));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let ledger = TransactionLedger::with_capacity(1);
        let now = Instant::now();
        ledger.record(now, now, Outcome::ReadOnly);
        ledger.record(now, now, Outcome::Committed { pushed: false });

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq, 2);
        assert_eq!(ledger.total(), 2);
    }

    #[test]
    fn overlap_detection() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(10);
        let t2 = t0 + Duration::from_millis(20);
        let t3 = t0 + Duration::from_millis(30);

        let a = TransactionRecord {
            seq: 1,
            started: t0,
            finished: t1,
            outcome: Outcome::ReadOnly,
        };
        let b = TransactionRecord {
            seq: 2,
            started: t2,
            finished: t3,
            outcome: Outcome::ReadOnly,
        };
        let c = TransactionRecord {
            seq: 3,
            started: t0,
            finished: t2,
            outcome: Outcome::ReadOnly,
        };

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(!c.overlaps(&b));
    }
}

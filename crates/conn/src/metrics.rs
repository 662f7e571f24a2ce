//! Counters describing what a connection did.
//!
//! The connection updates them from its own task; observers (tests, a status
//! endpoint) read them through a cloned [`ConnectionMetrics`] handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::arena::ArenaStats;

#[derive(Debug, Default)]
struct Counters {
    reads_issued: AtomicU64,
    writes_issued: AtomicU64,
    pending_reads: AtomicU64,
    pending_writes: AtomicU64,
    max_pending_reads: AtomicU64,
    max_pending_writes: AtomicU64,
    requests: AtomicU64,
    responses_completed: AtomicU64,
    producers_created: AtomicU64,
    scratch_inline: AtomicU64,
    scratch_heap: AtomicU64,
    reading: AtomicBool,
    writing: AtomicBool,
    in_response: AtomicBool,
    closed: AtomicBool,
}

/// Shared handle to the counters of one connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMetrics {
    counters: Arc<Counters>,
}

/// Point-in-time copy of [`ConnectionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads_issued: u64,
    pub writes_issued: u64,
    pub max_pending_reads: u64,
    pub max_pending_writes: u64,
    pub requests: u64,
    pub responses_completed: u64,
    pub producers_created: u64,
    pub scratch_inline: u64,
    pub scratch_heap: u64,
    pub reading: bool,
    pub writing: bool,
    pub in_response: bool,
    pub closed: bool,
}

impl MetricsSnapshot {
    /// Neither reading a request nor producing a response.
    pub fn is_idle(&self) -> bool {
        !self.writing && !self.in_response
    }
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read_issued(&self) {
        let c = &self.counters;
        c.reads_issued.fetch_add(1, Ordering::Relaxed);
        let pending = c.pending_reads.fetch_add(1, Ordering::Relaxed) + 1;
        c.max_pending_reads.fetch_max(pending, Ordering::Relaxed);
    }

    pub(crate) fn read_completed(&self) {
        self.counters.pending_reads.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn write_issued(&self) {
        let c = &self.counters;
        c.writes_issued.fetch_add(1, Ordering::Relaxed);
        let pending = c.pending_writes.fetch_add(1, Ordering::Relaxed) + 1;
        c.max_pending_writes.fetch_max(pending, Ordering::Relaxed);
    }

    pub(crate) fn write_completed(&self) {
        self.counters.pending_writes.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn request_received(&self) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn response_completed(&self) {
        self.counters.responses_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn producer_created(&self) {
        self.counters.producers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_arena(&self, stats: ArenaStats) {
        self.counters.scratch_inline.store(stats.inline_hits, Ordering::Relaxed);
        self.counters.scratch_heap.store(stats.heap_fallbacks, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, reading: bool, writing: bool, in_response: bool) {
        let c = &self.counters;
        c.reading.store(reading, Ordering::Relaxed);
        c.writing.store(writing, Ordering::Relaxed);
        c.in_response.store(in_response, Ordering::Relaxed);
    }

    pub(crate) fn set_closed(&self) {
        self.counters.closed.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            reads_issued: c.reads_issued.load(Ordering::Relaxed),
            writes_issued: c.writes_issued.load(Ordering::Relaxed),
            max_pending_reads: c.max_pending_reads.load(Ordering::Relaxed),
            max_pending_writes: c.max_pending_writes.load(Ordering::Relaxed),
            requests: c.requests.load(Ordering::Relaxed),
            responses_completed: c.responses_completed.load(Ordering::Relaxed),
            producers_created: c.producers_created.load(Ordering::Relaxed),
            scratch_inline: c.scratch_inline.load(Ordering::Relaxed),
            scratch_heap: c.scratch_heap.load(Ordering::Relaxed),
            reading: c.reading.load(Ordering::Relaxed),
            writing: c.writing.load(Ordering::Relaxed),
            in_response: c.in_response.load(Ordering::Relaxed),
            closed: c.closed.load(Ordering::Relaxed),
        }
    }
}

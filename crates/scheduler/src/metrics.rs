use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_submitted() {
    increment(&COUNTERS.submitted);
}

pub fn record_started() {
    increment(&COUNTERS.started);
}

pub fn record_succeeded() {
    increment(&COUNTERS.succeeded);
}

pub fn record_failed() {
    increment(&COUNTERS.failed);
}

pub fn record_cancelled() {
    increment(&COUNTERS.cancelled);
}

pub fn record_timed_out() {
    increment(&COUNTERS.timed_out);
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerMetricsSnapshot {
    pub submitted: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
}

pub fn snapshot() -> SchedulerMetricsSnapshot {
    SchedulerMetricsSnapshot {
        submitted: COUNTERS.submitted.load(Ordering::Relaxed),
        started: COUNTERS.started.load(Ordering::Relaxed),
        succeeded: COUNTERS.succeeded.load(Ordering::Relaxed),
        failed: COUNTERS.failed.load(Ordering::Relaxed),
        cancelled: COUNTERS.cancelled.load(Ordering::Relaxed),
        timed_out: COUNTERS.timed_out.load(Ordering::Relaxed),
    }
}

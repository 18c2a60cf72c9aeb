//! Lightweight in-memory resolution metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use access_core::AccessType;
use serde::Serialize;

#[derive(Default)]
struct ResolutionMetrics {
    total: AtomicU64,
    school: AtomicU64,
    class_subscription: AtomicU64,
    partial: AtomicU64,
    none: AtomicU64,
    source_failures: AtomicU64,
    source_timeouts: AtomicU64,
    malformed_rows: AtomicU64,
    calls: AtomicU64,
    duration_total_us: AtomicU64,
    duration_max_us: AtomicU64,
}

static RESOLUTION_METRICS: OnceLock<ResolutionMetrics> = OnceLock::new();

fn metrics() -> &'static ResolutionMetrics {
    RESOLUTION_METRICS.get_or_init(ResolutionMetrics::default)
}

/// Counts one class decision by its top-level access type.
pub fn record_decision(access_type: AccessType) {
    let metrics = metrics();
    metrics.total.fetch_add(1, Ordering::Relaxed);
    let bucket = match access_type {
        AccessType::School => &metrics.school,
        AccessType::ClassSubscription => &metrics.class_subscription,
        AccessType::Partial | AccessType::SubjectSubscription => &metrics.partial,
        AccessType::None => &metrics.none,
    };
    bucket.fetch_add(1, Ordering::Relaxed);
}

/// Records the wall time of one service call.
pub fn record_duration(duration_us: u64) {
    let metrics = metrics();
    metrics.calls.fetch_add(1, Ordering::Relaxed);
    metrics
        .duration_total_us
        .fetch_add(duration_us, Ordering::Relaxed);

    let mut current = metrics.duration_max_us.load(Ordering::Relaxed);
    while duration_us > current {
        match metrics.duration_max_us.compare_exchange(
            current,
            duration_us,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(next) => current = next,
        }
    }
}

pub fn record_source_failure(timed_out: bool) {
    let metrics = metrics();
    metrics.source_failures.fetch_add(1, Ordering::Relaxed);
    if timed_out {
        metrics.source_timeouts.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_malformed_rows(count: usize) {
    metrics()
        .malformed_rows
        .fetch_add(count as u64, Ordering::Relaxed);
}

#[derive(Debug, Serialize)]
pub struct ResolutionMetricsSnapshot {
    pub total: u64,
    pub school: u64,
    pub class_subscription: u64,
    pub partial: u64,
    pub none: u64,
    pub source_failures: u64,
    pub source_timeouts: u64,
    pub malformed_rows: u64,
    pub calls: u64,
    pub avg_duration_us: Option<f64>,
    pub max_duration_us: Option<u64>,
}

pub fn snapshot() -> ResolutionMetricsSnapshot {
    let metrics = metrics();
    let calls = metrics.calls.load(Ordering::Relaxed);
    let duration_total = metrics.duration_total_us.load(Ordering::Relaxed);
    let max_us = metrics.duration_max_us.load(Ordering::Relaxed);

    let avg_duration_us = if calls > 0 {
        Some(duration_total as f64 / calls as f64)
    } else {
        None
    };

    ResolutionMetricsSnapshot {
        total: metrics.total.load(Ordering::Relaxed),
        school: metrics.school.load(Ordering::Relaxed),
        class_subscription: metrics.class_subscription.load(Ordering::Relaxed),
        partial: metrics.partial.load(Ordering::Relaxed),
        none: metrics.none.load(Ordering::Relaxed),
        source_failures: metrics.source_failures.load(Ordering::Relaxed),
        source_timeouts: metrics.source_timeouts.load(Ordering::Relaxed),
        malformed_rows: metrics.malformed_rows.load(Ordering::Relaxed),
        calls,
        avg_duration_us,
        max_duration_us: if max_us > 0 { Some(max_us) } else { None },
    }
}

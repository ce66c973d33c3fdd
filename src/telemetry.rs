//! Process-wide command counters and slow-command reporting.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_SLOW_COMMAND_MS: u64 = 500;

#[derive(Default)]
struct Metrics {
    commands_total: AtomicU64,
    commands_failed_total: AtomicU64,
    commands_slow_total: AtomicU64,
    streams_total: AtomicU64,
}

struct Telemetry {
    slow_command_ms: AtomicU64,
    metrics: Metrics,
}

static TELEMETRY: LazyLock<Telemetry> = LazyLock::new(|| {
    let slow = std::env::var("MINQ_SLOW_COMMAND_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SLOW_COMMAND_MS);
    Telemetry { slow_command_ms: AtomicU64::new(slow), metrics: Metrics::default() }
});

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub commands_total: u64,
    pub commands_failed_total: u64,
    pub commands_slow_total: u64,
    pub streams_total: u64,
}

pub fn set_slow_command_ms(ms: u64) {
    TELEMETRY.slow_command_ms.store(ms, Ordering::Relaxed);
}

#[must_use]
pub fn slow_command_ms() -> u64 {
    TELEMETRY.slow_command_ms.load(Ordering::Relaxed)
}

fn is_slow(elapsed_ms: u64, threshold_ms: u64) -> bool {
    elapsed_ms >= threshold_ms
}

/// Count one executed command and emit its dev6 line.
pub fn record_command(op: &str, collection: &str, elapsed: Duration, ok: bool) {
    let m = &TELEMETRY.metrics;
    m.commands_total.fetch_add(1, Ordering::Relaxed);
    if !ok {
        m.commands_failed_total.fetch_add(1, Ordering::Relaxed);
    }
    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    if is_slow(ms, slow_command_ms()) {
        m.commands_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!("slow command: {op} on {collection} took {ms}ms");
    }
    let line = serde_json::json!({
        "bench": "command",
        "op": op,
        "collection": collection,
        "duration_ms": ms,
        "ok": ok,
    });
    crate::dev6!("{line}");
}

pub fn record_stream(collection: &str) {
    TELEMETRY.metrics.streams_total.fetch_add(1, Ordering::Relaxed);
    log::trace!("stream opened on {collection}");
}

#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        commands_total: m.commands_total.load(Ordering::Relaxed),
        commands_failed_total: m.commands_failed_total.load(Ordering::Relaxed),
        commands_slow_total: m.commands_slow_total.load(Ordering::Relaxed),
        streams_total: m.streams_total.load(Ordering::Relaxed),
    }
}

/// Counters in OpenMetrics text form.
#[must_use]
pub fn metrics_text() -> String {
    let s = snapshot();
    format!(
        "minq_commands_total {}\n\
         minq_commands_failed_total {}\n\
         minq_commands_slow_total {}\n\
         minq_streams_total {}\n",
        s.commands_total, s.commands_failed_total, s.commands_slow_total, s.streams_total,
    )
}

//! Application metrics collection and reporting.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use storage::{MemoryStoreStats, TileCacheStats};

/// Request and render counters for the service.
#[derive(Debug)]
pub struct MetricsCollector {
    pub tile_requests: AtomicU64,
    pub feature_requests: AtomicU64,
    pub tiles_rendered: AtomicU64,
    pub render_failures: AtomicU64,
    render_time_us: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tile_requests: AtomicU64::new(0),
            feature_requests: AtomicU64::new(0),
            tiles_rendered: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            render_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tile_request(&self) {
        self.tile_requests.fetch_add(1, Ordering::Relaxed);
        counter!("tile_requests_total").increment(1);
    }

    pub fn record_feature_request(&self) {
        self.feature_requests.fetch_add(1, Ordering::Relaxed);
        counter!("feature_requests_total").increment(1);
    }

    /// Record a completed render (rasterize + encode).
    pub fn record_render(&self, duration: Duration) {
        let duration_us = duration.as_micros() as u64;
        self.tiles_rendered.fetch_add(1, Ordering::Relaxed);
        self.render_time_us.fetch_add(duration_us, Ordering::Relaxed);
        counter!("tiles_rendered_total").increment(1);
        histogram!("tile_render_duration_ms").record(duration_us as f64 / 1000.0);
    }

    pub fn record_render_failure(&self, reason: &'static str) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
        counter!("tile_render_failures_total", "reason" => reason).increment(1);
    }

    /// Publish cache statistics as gauges.
    pub fn publish_cache_stats(&self, tile: &TileCacheStats, l1: &MemoryStoreStats) {
        gauge!("tile_cache_hits_total").set(tile.hits() as f64);
        gauge!("tile_cache_misses_total").set(tile.misses() as f64);
        gauge!("tile_cache_bypass_total").set(tile.bypassed() as f64);
        gauge!("tile_cache_errors_total").set(tile.store_errors() as f64);
        gauge!("tile_cache_writes_total").set(tile.writes() as f64);

        gauge!("l1_cache_hits_total").set(l1.hits.load(Ordering::Relaxed) as f64);
        gauge!("l1_cache_misses_total").set(l1.misses.load(Ordering::Relaxed) as f64);
        gauge!("l1_cache_hit_rate_percent").set(l1.hit_rate());
        gauge!("l1_cache_evictions_total").set(l1.evictions.load(Ordering::Relaxed) as f64);
        gauge!("l1_cache_expired_total").set(l1.expired.load(Ordering::Relaxed) as f64);
        gauge!("l1_cache_size_bytes").set(l1.size_bytes() as f64);
        gauge!("l1_cache_entries").set(l1.entry_count() as f64);

        gauge!("uptime_seconds").set(self.start_time.elapsed().as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rendered = self.tiles_rendered.load(Ordering::Relaxed);
        let total_us = self.render_time_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            tile_requests: self.tile_requests.load(Ordering::Relaxed),
            feature_requests: self.feature_requests.load(Ordering::Relaxed),
            tiles_rendered: rendered,
            render_failures: self.render_failures.load(Ordering::Relaxed),
            avg_render_ms: if rendered == 0 {
                0.0
            } else {
                total_us as f64 / rendered as f64 / 1000.0
            },
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub tile_requests: u64,
    pub feature_requests: u64,
    pub tiles_rendered: u64,
    pub render_failures: u64,
    pub avg_render_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_average() {
        let metrics = MetricsCollector::new();
        metrics.record_render(Duration::from_millis(10));
        metrics.record_render(Duration::from_millis(30));
        metrics.record_render_failure("style");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tiles_rendered, 2);
        assert_eq!(snapshot.render_failures, 1);
        assert!((snapshot.avg_render_ms - 20.0).abs() < 1e-9);
    }
}

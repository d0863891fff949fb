//! Periodic feed statistics summary.
//!
//! Reads the process-wide counters back out of the Prometheus registry and
//! logs a compact summary of feed health:
//! - accepted events and sequence gaps
//! - alerts per severity
//! - reconnections and rejections
//! - publish delay distribution (P50/P95/P99)

use crate::metrics::{
    ALERTS_TOTAL, EVENTS_ACCEPTED_TOTAL, FEED_DELAY_MS, REJECTIONS_TOTAL, SEQUENCE_GAPS_TOTAL,
    WS_RECONNECT_TOTAL,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use tracing::info;

/// Snapshot of feed statistics since process start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedStats {
    pub events_accepted: u64,
    pub sequence_gaps: u64,
    pub alerts_cheap: u64,
    pub alerts_solid: u64,
    pub alerts_big: u64,
    pub reconnects: u64,
    pub rejections: u64,
    pub delay_p50_ms: f64,
    pub delay_p95_ms: f64,
    pub delay_p99_ms: f64,
}

impl FeedStats {
    pub fn alerts_total(&self) -> u64 {
        self.alerts_cheap + self.alerts_solid + self.alerts_big
    }
}

/// Feed statistics reporter.
pub struct FeedStatsReporter {
    start_time: DateTime<Utc>,
}

impl Default for FeedStatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatsReporter {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
        }
    }

    /// Collect current statistics.
    pub fn get_stats(&self) -> FeedStats {
        let (delay_p50_ms, delay_p95_ms, delay_p99_ms) = delay_percentiles();

        FeedStats {
            events_accepted: EVENTS_ACCEPTED_TOTAL.get() as u64,
            sequence_gaps: SEQUENCE_GAPS_TOTAL.get() as u64,
            alerts_cheap: ALERTS_TOTAL.with_label_values(&["cheap"]).get() as u64,
            alerts_solid: ALERTS_TOTAL.with_label_values(&["solid"]).get() as u64,
            alerts_big: ALERTS_TOTAL.with_label_values(&["big"]).get() as u64,
            reconnects: sum_counter_vec(&WS_RECONNECT_TOTAL),
            rejections: sum_counter_vec(&REJECTIONS_TOTAL),
            delay_p50_ms,
            delay_p95_ms,
            delay_p99_ms,
        }
    }

    /// Output the summary to logs.
    pub fn output_summary(&self) {
        let s = self.get_stats();
        let duration = Utc::now() - self.start_time;

        info!("========== Feed Statistics Summary ==========");
        info!(
            "Since: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            duration.num_hours(),
            duration.num_minutes() % 60
        );
        info!(
            "  Events accepted: {} (sequence gaps: {})",
            s.events_accepted, s.sequence_gaps
        );
        info!(
            "  Alerts: {} (cheap: {}, solid: {}, big: {})",
            s.alerts_total(),
            s.alerts_cheap,
            s.alerts_solid,
            s.alerts_big
        );
        info!(
            "  Reconnects: {}, rejections: {}",
            s.reconnects, s.rejections
        );
        info!(
            "  Publish delay (ms): P50={:.1}, P95={:.1}, P99={:.1}",
            s.delay_p50_ms, s.delay_p95_ms, s.delay_p99_ms
        );
        info!("=============================================");
    }
}

fn sum_counter_vec(counter: &prometheus::CounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value())
        .sum::<f64>() as u64
}

fn delay_percentiles() -> (f64, f64, f64) {
    for mf in FEED_DELAY_MS.collect() {
        for m in mf.get_metric() {
            let h = m.get_histogram();
            let count = h.get_sample_count();
            if count == 0 {
                return (0.0, 0.0, 0.0);
            }
            let buckets: Vec<(f64, u64)> = h
                .get_bucket()
                .iter()
                .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                .collect();
            return (
                percentile_from_buckets(&buckets, count, 0.50),
                percentile_from_buckets(&buckets, count, 0.95),
                percentile_from_buckets(&buckets, count, 0.99),
            );
        }
    }
    (0.0, 0.0, 0.0)
}

/// Percentile from cumulative `(upper_bound, count)` buckets, interpolated
/// linearly within the matching bucket.
fn percentile_from_buckets(buckets: &[(f64, u64)], total_count: u64, percentile: f64) -> f64 {
    let target = (total_count as f64 * percentile) as u64;
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for &(upper_bound, cumulative_count) in buckets {
        if cumulative_count >= target {
            let bucket_count = cumulative_count - prev_count;
            if bucket_count == 0 {
                return upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }
        prev_bound = upper_bound;
        prev_count = cumulative_count;
    }

    buckets.last().map(|b| b.0).unwrap_or(0.0)
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-method invocation metrics.
//!
//! Lightweight in-process counters and latency histograms for intercepted
//! methods, keyed by `Target.method`. Owned by whoever installs the services
//! and shared with every interceptor through an `Arc`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Invocation metrics for every intercepted method.
#[derive(Debug)]
pub struct Metrics {
    methods: RwLock<HashMap<String, MethodMetrics>>,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one invocation of `method` (a `Target.method` key).
    pub fn record_invocation(&self, method: &str, duration: Duration, success: bool) {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        methods
            .entry(method.to_string())
            .or_insert_with(MethodMetrics::new)
            .record(duration, success);
    }

    /// Get metrics for a specific method.
    pub fn method_metrics(&self, method: &str) -> Option<MethodMetrics> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            methods: methods.clone(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for one intercepted method.
#[derive(Debug, Clone)]
pub struct MethodMetrics {
    /// Total number of invocations.
    pub invocations: u64,

    /// Invocations that returned normally (including suppressed errors).
    pub successes: u64,

    /// Invocations that ended in an error.
    pub failures: u64,

    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,

    /// Latency distribution.
    pub histogram: LatencyHistogram,
}

impl MethodMetrics {
    pub fn new() -> Self {
        Self {
            invocations: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: LatencyHistogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.invocations == 0 {
            Duration::ZERO
        } else {
            self.total_duration.div_f64(self.invocations as f64)
        }
    }

    /// Success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            1.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

impl Default for MethodMetrics {
    fn default() -> Self {
        Self::new()
    }
}

const LATENCY_BUCKETS: usize = 28;

/// Latency distribution over power-of-two microsecond buckets.
///
/// Bucket `i` holds calls that took under `2^i` microseconds and at least
/// `2^(i-1)`. The last bucket (from about 67 s) also takes anything slower.
#[derive(Debug, Clone, Default)]
pub struct LatencyHistogram {
    counts: [u64; LATENCY_BUCKETS],
}

impl LatencyHistogram {
    pub fn record(&mut self, duration: Duration) {
        self.counts[Self::bucket_of(duration)] += 1;
    }

    fn bucket_of(duration: Duration) -> usize {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let bits = (u64::BITS - micros.leading_zeros()) as usize;
        bits.min(LATENCY_BUCKETS - 1)
    }

    /// Exclusive upper bound of a bucket.
    pub fn bucket_bound(index: usize) -> Duration {
        Duration::from_micros(1u64 << index.min(LATENCY_BUCKETS - 1))
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Upper bound of the bucket holding quantile `q` (0.0 to 1.0).
    pub fn quantile(&self, q: f64) -> Duration {
        let total = self.total();
        if total == 0 {
            return Duration::ZERO;
        }
        let rank = ((total as f64) * q.clamp(0.0, 1.0)).ceil().max(1.0) as u64;

        let mut seen = 0u64;
        for (index, count) in self.counts.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return Self::bucket_bound(index);
            }
        }
        Self::bucket_bound(LATENCY_BUCKETS - 1)
    }

    pub fn median(&self) -> Duration {
        self.quantile(0.5)
    }

    pub fn p99(&self) -> Duration {
        self.quantile(0.99)
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub methods: HashMap<String, MethodMetrics>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Invocation Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n\n", self.uptime));

        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        for name in names {
            let metrics = &self.methods[name];
            report.push_str(&format!(
                "  {}: {} calls, {:.1}% success, avg {:.2?}, p99 {:.2?}\n",
                name,
                metrics.invocations,
                metrics.success_rate() * 100.0,
                metrics.avg_duration(),
                metrics.histogram.p99()
            ));
        }

        report
    }
}

//! C2: striped rolling ring buffers producing P50/P95/P99 per pipeline step.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Pipeline steps the performance monitor tracks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementType {
    Decode,
    HeaderValidate,
    SignatureVerify,
    ClaimValidate,
    CacheLookup,
    JwksFetch,
    FullPipeline,
}

impl MeasurementType {
    const ALL: [MeasurementType; 7] = [
        Self::Decode,
        Self::HeaderValidate,
        Self::SignatureVerify,
        Self::ClaimValidate,
        Self::CacheLookup,
        Self::JwksFetch,
        Self::FullPipeline,
    ];

    fn index(self) -> usize {
        match self {
            Self::Decode => 0,
            Self::HeaderValidate => 1,
            Self::SignatureVerify => 2,
            Self::ClaimValidate => 3,
            Self::CacheLookup => 4,
            Self::JwksFetch => 5,
            Self::FullPipeline => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::HeaderValidate => "header_validate",
            Self::SignatureVerify => "signature_verify",
            Self::ClaimValidate => "claim_validate",
            Self::CacheLookup => "cache_lookup",
            Self::JwksFetch => "jwks_fetch",
            Self::FullPipeline => "full_pipeline",
        }
    }
}

const STRIPES: usize = 8;
const RING_SIZE: usize = 512;

/// One fixed-size ring buffer of nanosecond durations plus a write cursor.
/// Writes are serialized by a short-held mutex; reads (for percentiles) only
/// happen on the cold `performance()` path, so contention on the hot write
/// path is the only thing that matters and stripes keep it low.
struct Ring {
    samples: Mutex<[u64; RING_SIZE]>,
    cursor: AtomicUsize,
    count: AtomicU64,
}

impl Ring {
    fn new() -> Self {
        Self {
            samples: Mutex::new([0u64; RING_SIZE]),
            cursor: AtomicUsize::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn record(&self, nanos: u64) {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % RING_SIZE;
        if let Ok(mut samples) = self.samples.lock() {
            samples[idx] = nanos;
        }
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Vec<u64> {
        let total = self.count.load(Ordering::Relaxed);
        let samples = match self.samples.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let len = std::cmp::min(total as usize, RING_SIZE);
        samples[..len].to_vec()
    }
}

/// Percentile summary for one [`MeasurementType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceStats {
    pub p50_nanos: u64,
    pub p95_nanos: u64,
    pub p99_nanos: u64,
    pub samples: usize,
}

/// A striped collection of rings: one set of [`STRIPES`] rings per
/// [`MeasurementType`], selected by hashing the current thread id, so
/// concurrent writers from different threads rarely contend on the same
/// mutex. Grounded on `src/middleware/metrics.rs`'s `HistogramMetric`, which
/// uses the analogous bucketed-atomics approach for request latency.
pub struct PerformanceMonitor {
    rings: Vec<[Ring; STRIPES]>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        let rings = MeasurementType::ALL
            .iter()
            .map(|_| std::array::from_fn(|_| Ring::new()))
            .collect();
        Self { rings }
    }

    fn stripe_for_current_thread() -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        (hasher.finish() as usize) % STRIPES
    }

    pub fn record(&self, measurement: MeasurementType, duration: Duration) {
        let stripe = Self::stripe_for_current_thread();
        let nanos = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.rings[measurement.index()][stripe].record(nanos);
    }

    /// Convenience wrapper: times `f` and records it, returning `f`'s result.
    pub fn time<T>(&self, measurement: MeasurementType, f: impl FnOnce() -> T) -> T {
        let start = std::time::Instant::now();
        let result = f();
        self.record(measurement, start.elapsed());
        result
    }

    pub fn stats(&self, measurement: MeasurementType) -> PerformanceStats {
        let mut all: Vec<u64> = self.rings[measurement.index()]
            .iter()
            .flat_map(|ring| ring.snapshot())
            .collect();
        if all.is_empty() {
            return PerformanceStats::default();
        }
        all.sort_unstable();
        let percentile = |p: f64| -> u64 {
            let idx = ((all.len() as f64 - 1.0) * p).round() as usize;
            all[idx.min(all.len() - 1)]
        };
        PerformanceStats {
            p50_nanos: percentile(0.50),
            p95_nanos: percentile(0.95),
            p99_nanos: percentile(0.99),
            samples: all.len(),
        }
    }

    pub fn all_stats(&self) -> std::collections::HashMap<&'static str, PerformanceStats> {
        MeasurementType::ALL
            .iter()
            .map(|&m| (m.name(), self.stats(m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_percentiles() {
        let monitor = PerformanceMonitor::new();
        for ms in [1, 2, 3, 4, 5, 100] {
            monitor.record(MeasurementType::SignatureVerify, Duration::from_millis(ms));
        }
        let stats = monitor.stats(MeasurementType::SignatureVerify);
        assert_eq!(stats.samples, 6);
        assert!(stats.p99_nanos >= stats.p50_nanos);
    }

    #[test]
    fn empty_measurement_returns_zeroed_stats() {
        let monitor = PerformanceMonitor::new();
        let stats = monitor.stats(MeasurementType::JwksFetch);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.p50_nanos, 0);
    }

    #[test]
    fn time_helper_records_and_returns_value() {
        let monitor = PerformanceMonitor::new();
        let value = monitor.time(MeasurementType::Decode, || 42);
        assert_eq!(value, 42);
        assert_eq!(monitor.stats(MeasurementType::Decode).samples, 1);
    }
}

//! Latency tracking for engine calls.
//!
//! One HdrHistogram per engine operation, fed by a raw-counter clock.
//! Reports are taken as [`LatencySnapshot`]s so the histogram can keep
//! recording while a report is formatted.

use core::fmt;

use hdrhistogram::{CreationError, Histogram};

/// Significant digits kept by default.
pub const DEFAULT_SIGFIG: u8 = 3;

/// Nanosecond latency histogram.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Histogram with [`DEFAULT_SIGFIG`] significant digits.
    pub fn new() -> Result<Self, CreationError> {
        Self::with_precision(DEFAULT_SIGFIG)
    }

    /// Histogram with 0-5 significant digits.
    pub fn with_precision(sigfig: u8) -> Result<Self, CreationError> {
        Ok(Self { histogram: Histogram::new(sigfig)? })
    }

    /// Values the histogram cannot hold are dropped.
    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        let _ = self.histogram.record(nanos);
    }

    /// Value at `percentile` (0.0 - 100.0).
    pub fn percentile(&self, percentile: f64) -> u64 {
        self.histogram.value_at_quantile(percentile / 100.0)
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    pub fn clear(&mut self) {
        self.histogram.reset();
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            count: self.histogram.len(),
            min: self.histogram.min(),
            mean: self.histogram.mean() as u64,
            p50: self.percentile(50.0),
            p99: self.percentile(99.0),
            p999: self.percentile(99.9),
            max: self.histogram.max(),
        }
    }
}

/// Point-in-time summary of a [`LatencyHistogram`], in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencySnapshot {
    pub count: u64,
    pub min: u64,
    pub mean: u64,
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl fmt::Display for LatencySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mean={} p50={} p99={} p99.9={} max={}",
            self.count,
            Nanos(self.mean),
            Nanos(self.p50),
            Nanos(self.p99),
            Nanos(self.p999),
            Nanos(self.max),
        )
    }
}

/// Nanosecond count printed in the largest unit that keeps it above one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nanos(pub u64);

impl fmt::Display for Nanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 3] = [(1_000_000_000, "s"), (1_000_000, "ms"), (1_000, "μs")];
        for (scale, unit) in UNITS {
            if self.0 >= scale {
                return write!(f, "{:.2} {}", self.0 as f64 / scale as f64, unit);
            }
        }
        write!(f, "{} ns", self.0)
    }
}

/// Engine entry points measured separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    AddOrder,
    CancelOrder,
    DecrementQuantity,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::AddOrder, Operation::CancelOrder, Operation::DecrementQuantity];

    pub const fn name(self) -> &'static str {
        match self {
            Operation::AddOrder => "add_order",
            Operation::CancelOrder => "cancel_order",
            Operation::DecrementQuantity => "decrement_quantity",
        }
    }
}

/// One histogram per [`Operation`], fed by a shared clock.
pub struct EngineLatency {
    clock: LatencyClock,
    histograms: [LatencyHistogram; 3],
}

impl EngineLatency {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            clock: LatencyClock::new(),
            histograms: [LatencyHistogram::new()?, LatencyHistogram::new()?, LatencyHistogram::new()?],
        })
    }

    /// Run `f` and record how long it took under `op`.
    #[inline]
    pub fn measure<R>(&mut self, op: Operation, f: impl FnOnce() -> R) -> R {
        let start = self.clock.now();
        let result = f();
        let elapsed = self.clock.nanos_since(start);
        self.histograms[op as usize].record(elapsed);
        result
    }

    pub fn histogram(&self, op: Operation) -> &LatencyHistogram {
        &self.histograms[op as usize]
    }

    /// Calls measured across all operations.
    pub fn total_count(&self) -> u64 {
        self.histograms.iter().map(LatencyHistogram::len).sum()
    }
}

/// Raw-counter clock; readings are only meaningful relative to each other.
pub struct LatencyClock {
    clock: quanta::Clock,
}

impl LatencyClock {
    pub fn new() -> Self {
        Self { clock: quanta::Clock::new() }
    }

    #[inline(always)]
    pub fn now(&self) -> u64 {
        self.clock.raw()
    }

    /// Nanoseconds elapsed since the raw reading `start`.
    #[inline(always)]
    pub fn nanos_since(&self, start: u64) -> u64 {
        self.clock.delta_as_nanos(start, self.clock.raw())
    }
}

impl Default for LatencyClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_of_uniform_samples() {
        let mut h = LatencyHistogram::new().unwrap();
        for i in 1..=100 {
            h.record(i * 100);
        }

        let snap = h.snapshot();
        assert_eq!(snap.count, 100);
        assert_eq!(snap.min, 100);
        assert!((4900..=5100).contains(&snap.p50));
        // Max is rounded to the histogram's precision
        assert!((10000..=10100).contains(&snap.max));

        h.clear();
        assert!(h.is_empty());
    }

    #[test]
    fn precision_out_of_range() {
        assert!(LatencyHistogram::with_precision(6).is_err());
    }

    #[test]
    fn nanos_pick_a_unit() {
        assert_eq!(Nanos(500).to_string(), "500 ns");
        assert_eq!(Nanos(5_000).to_string(), "5.00 μs");
        assert_eq!(Nanos(5_000_000).to_string(), "5.00 ms");
        assert_eq!(Nanos(2_500_000_000).to_string(), "2.50 s");
    }

    #[test]
    fn measure_routes_by_operation() {
        let mut latency = EngineLatency::new().unwrap();
        let value = latency.measure(Operation::AddOrder, || 41 + 1);
        latency.measure(Operation::CancelOrder, || ());
        latency.measure(Operation::AddOrder, || ());

        assert_eq!(value, 42);
        assert_eq!(latency.histogram(Operation::AddOrder).len(), 2);
        assert_eq!(latency.histogram(Operation::CancelOrder).len(), 1);
        assert!(latency.histogram(Operation::DecrementQuantity).is_empty());
        assert_eq!(latency.total_count(), 3);
    }

    #[test]
    fn snapshot_display() {
        let mut h = LatencyHistogram::new().unwrap();
        h.record(250);
        assert_eq!(
            h.snapshot().to_string(),
            "n=1 mean=250 ns p50=250 ns p99=250 ns p99.9=250 ns max=250 ns"
        );
    }
}

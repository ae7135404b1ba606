//! Security event counters and a striped performance monitor.
//!
//! Grounded on `src/middleware/metrics.rs`'s atomic histogram/counter style:
//! everything here is plain `std::sync::atomic`, no external crate, because
//! the teacher's own equivalent has none either.

pub mod counters;
pub mod perf;

pub use counters::{EventKind, SecurityEventCounter};
pub use perf::{MeasurementType, PerformanceMonitor, PerformanceStats};

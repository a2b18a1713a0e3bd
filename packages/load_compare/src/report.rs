use std::fmt;
use std::time::Duration;

use crate::{HeapSnapshot, Mode};

/// What one mode of the harness observed.
#[derive(Clone, Debug, PartialEq)]
#[must_use = "the report is the only output of a harness run"]
pub struct ModeReport {
    mode: Mode,
    invocations: u64,
    elapsed: Duration,
    heap_before: Option<HeapSnapshot>,
    heap_after: Option<HeapSnapshot>,
}

impl ModeReport {
    pub(crate) fn new(
        mode: Mode,
        invocations: u64,
        elapsed: Duration,
        heap_before: Option<HeapSnapshot>,
        heap_after: Option<HeapSnapshot>,
    ) -> Self {
        Self {
            mode,
            invocations,
            elapsed,
            heap_before,
            heap_after,
        }
    }

    /// The mode this report describes.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// How many times the task was invoked.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Wall-clock time from the start of the mode until every invocation had completed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Heap counters taken just before the timed region, if heap tracking is installed.
    #[must_use]
    pub fn heap_before(&self) -> Option<&HeapSnapshot> {
        self.heap_before.as_ref()
    }

    /// Heap counters taken just after the timed region, if heap tracking is installed.
    #[must_use]
    pub fn heap_after(&self) -> Option<&HeapSnapshot> {
        self.heap_after.as_ref()
    }

    /// Heap growth during the mode, if both snapshots exist.
    #[must_use]
    pub fn heap_delta(&self) -> Option<HeapSnapshot> {
        Some(self.heap_after?.since(self.heap_before.as_ref()?))
    }

    /// The headline line announcing the mode.
    #[must_use]
    pub fn heading(mode: Mode) -> String {
        format!("Running {} test...", mode.label().to_lowercase())
    }
}

/// Renders the memory and timing lines of the mode, one per line.
///
/// ```text
/// Before Single-threaded Test Memory Usage: Live = 0.01 MB, TotalAlloc = 0.02 MB, Allocations = 12
/// Single-threaded computation time: 12.34 ms
/// After Single-threaded Test Memory Usage: Live = 0.01 MB, TotalAlloc = 9.80 MB, Allocations = 4012
/// Single-threaded invocations: 400
/// ```
impl fmt::Display for ModeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.mode.label();

        if let Some(before) = &self.heap_before {
            writeln!(f, "Before {label} Test Memory Usage: {before}")?;
        }

        writeln!(
            f,
            "{label} computation time: {:.2} ms",
            self.elapsed.as_secs_f64() * 1000.0
        )?;

        if let Some(after) = &self.heap_after {
            writeln!(f, "After {label} Test Memory Usage: {after}")?;
        }

        write!(f, "{label} invocations: {}", self.invocations)
    }
}

/// The sequential and concurrent reports of one [`Harness::compare()`][crate::Harness::compare].
#[derive(Clone, Debug, PartialEq)]
#[must_use = "the comparison is the only output of a harness run"]
pub struct Comparison {
    sequential: ModeReport,
    concurrent: ModeReport,
}

impl Comparison {
    /// Pairs a sequential report with a concurrent report.
    pub fn new(sequential: ModeReport, concurrent: ModeReport) -> Self {
        Self {
            sequential,
            concurrent,
        }
    }

    /// The sequential mode report.
    pub fn sequential(&self) -> &ModeReport {
        &self.sequential
    }

    /// The concurrent mode report.
    pub fn concurrent(&self) -> &ModeReport {
        &self.concurrent
    }

    /// How many times faster the concurrent mode was than the sequential mode.
    ///
    /// Returns `None` if the concurrent mode took no measurable time.
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        if self.concurrent.elapsed.is_zero() {
            return None;
        }

        Some(self.sequential.elapsed.as_secs_f64() / self.concurrent.elapsed.as_secs_f64())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", ModeReport::heading(self.sequential.mode))?;
        writeln!(f, "{}", self.sequential)?;
        writeln!(f)?;
        writeln!(f, "{}", ModeReport::heading(self.concurrent.mode))?;
        writeln!(f, "{}", self.concurrent)?;
        writeln!(f)?;

        match self.speedup() {
            Some(speedup) => write!(f, "Speedup: {speedup:.2}x"),
            None => write!(f, "Speedup: n/a"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn report(mode: Mode, millis: u64, heap: bool) -> ModeReport {
        let before = heap.then(|| HeapSnapshot::from_parts(1024 * 1024, 2 * 1024 * 1024, 10));
        let after = heap.then(|| HeapSnapshot::from_parts(1024 * 1024, 6 * 1024 * 1024, 30));

        ModeReport::new(mode, 400, Duration::from_millis(millis), before, after)
    }

    #[test]
    fn headings_match_mode_labels() {
        assert_eq!(
            ModeReport::heading(Mode::Sequential),
            "Running single-threaded test..."
        );
        assert_eq!(
            ModeReport::heading(Mode::Concurrent),
            "Running multi-threaded test..."
        );
    }

    #[test]
    fn display_without_heap_has_timing_and_count() {
        let text = report(Mode::Sequential, 1500, false).to_string();

        assert_eq!(
            text,
            "Single-threaded computation time: 1500.00 ms\nSingle-threaded invocations: 400"
        );
    }

    #[test]
    fn display_with_heap_wraps_timing() {
        let text = report(Mode::Concurrent, 250, true).to_string();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Before Multi-threaded Test Memory Usage: Live = 1.00 MB"));
        assert_eq!(lines[1], "Multi-threaded computation time: 250.00 ms");
        assert!(lines[2].starts_with("After Multi-threaded Test Memory Usage:"));
    }

    #[test]
    fn heap_delta_requires_both_snapshots() {
        assert!(report(Mode::Sequential, 1, false).heap_delta().is_none());

        let delta = report(Mode::Sequential, 1, true).heap_delta().unwrap();
        assert_eq!(delta.total_allocated_bytes(), 4 * 1024 * 1024);
        assert_eq!(delta.allocation_count(), 20);
    }

    #[test]
    fn speedup_is_ratio_of_elapsed_times() {
        let comparison = Comparison::new(
            report(Mode::Sequential, 1000, false),
            report(Mode::Concurrent, 250, false),
        );

        let speedup = comparison.speedup().unwrap();
        assert!((speedup - 4.0).abs() < 1e-9);
        assert!(comparison.to_string().ends_with("Speedup: 4.00x"));
    }

    #[test]
    fn speedup_of_instant_concurrent_run_is_undefined() {
        let comparison = Comparison::new(
            report(Mode::Sequential, 1000, false),
            report(Mode::Concurrent, 0, false),
        );

        assert!(comparison.speedup().is_none());
        assert!(comparison.to_string().ends_with("Speedup: n/a"));
    }
}

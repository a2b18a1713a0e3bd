use std::fmt;
use std::str::FromStr;

/// How many task invocations a run performs and how they are spread.
///
/// In sequential mode the concurrency degree is the number of outer loop iterations; in
/// concurrent mode it is the number of worker threads. Either way, every mode performs
/// `repetitions_per_worker * concurrency_degree` invocations.
///
/// # Examples
///
/// ```
/// use load_compare::RunConfig;
///
/// let config = RunConfig::new(20, 20);
/// assert_eq!(config.total_invocations(), 400);
/// assert_eq!(config, RunConfig::default());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunConfig {
    repetitions_per_worker: u64,
    concurrency_degree: usize,
}

impl RunConfig {
    /// Repetitions per worker used when nothing else is configured.
    pub const DEFAULT_REPETITIONS: u64 = 20;

    /// Concurrency degree used when nothing else is configured.
    pub const DEFAULT_CONCURRENCY: usize = 20;

    /// Creates a configuration with the given repetition count and concurrency degree.
    ///
    /// Zero is valid for both and results in a run that performs no invocations.
    #[must_use]
    pub const fn new(repetitions_per_worker: u64, concurrency_degree: usize) -> Self {
        Self {
            repetitions_per_worker,
            concurrency_degree,
        }
    }

    /// Number of task invocations each worker (or each outer iteration) performs.
    #[must_use]
    pub const fn repetitions_per_worker(&self) -> u64 {
        self.repetitions_per_worker
    }

    /// Number of workers (concurrent mode) or outer iterations (sequential mode).
    #[must_use]
    pub const fn concurrency_degree(&self) -> usize {
        self.concurrency_degree
    }

    /// Total number of task invocations one mode performs, saturating at `u64::MAX`.
    #[must_use]
    pub fn total_invocations(&self) -> u64 {
        let degree = u64::try_from(self.concurrency_degree).unwrap_or(u64::MAX);
        self.repetitions_per_worker.saturating_mul(degree)
    }

    /// The invocation index for a given worker (outer iteration) and repetition.
    ///
    /// Indexes are unique within one mode as long as the total fits in `u64`.
    #[must_use]
    pub fn invocation_index(&self, worker: usize, repetition: u64) -> u64 {
        let worker = u64::try_from(worker).unwrap_or(u64::MAX);
        worker
            .wrapping_mul(self.repetitions_per_worker)
            .wrapping_add(repetition)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REPETITIONS, Self::DEFAULT_CONCURRENCY)
    }
}

/// Sizing of the work performed by one [`SyntheticTask`][crate::SyntheticTask] invocation.
///
/// The defaults reproduce the reference benchmark. Tests shrink the profile to keep runs fast.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct WorkloadProfile {
    /// Terms of the trigonometric/exponential series.
    pub series_terms: u32,

    /// Dimension of the square matrices that get multiplied.
    pub matrix_size: u32,

    /// Number of segments concatenated into the scratch string.
    pub string_segments: u32,

    /// Number of values inserted into and looked up in the hash set.
    pub set_size: u32,

    /// Length of the pseudo-random array that is sorted and searched.
    pub sort_len: u32,
}

impl WorkloadProfile {
    /// The sizing used by the reference benchmark.
    pub const REFERENCE: Self = Self {
        series_terms: 100,
        matrix_size: 200,
        string_segments: 500,
        set_size: 500,
        sort_len: 200,
    };

    /// A profile that keeps every step but does very little work in each.
    pub const TINY: Self = Self {
        series_terms: 10,
        matrix_size: 4,
        string_segments: 20,
        set_size: 10,
        sort_len: 10,
    };

    /// Returns a copy of the profile with a different matrix dimension.
    #[must_use]
    pub const fn with_matrix_size(mut self, matrix_size: u32) -> Self {
        self.matrix_size = matrix_size;
        self
    }
}

impl Default for WorkloadProfile {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// One of the two execution strategies the harness can time.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "the comparison is between exactly these two modes"
)]
pub enum Mode {
    /// All invocations run one after another on the calling thread.
    Sequential,

    /// Invocations are split across worker threads that run in parallel.
    Concurrent,
}

impl Mode {
    /// Human-readable label used in report lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sequential => "Single-threaded",
            Self::Concurrent => "Multi-threaded",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which modes a process invocation should run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ModeSelection {
    /// Only the sequential mode.
    Sequential,

    /// Only the concurrent mode.
    Concurrent,

    /// Sequential mode followed by concurrent mode.
    #[default]
    Both,
}

impl ModeSelection {
    /// The modes to run, in execution order.
    #[must_use]
    pub fn modes(self) -> &'static [Mode] {
        match self {
            Self::Sequential => &[Mode::Sequential],
            Self::Concurrent => &[Mode::Concurrent],
            Self::Both => &[Mode::Sequential, Mode::Concurrent],
        }
    }
}

impl FromStr for ModeSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            "both" => Ok(Self::Both),
            _ => Err(format!(
                "Invalid mode: '{s}'. Valid options are: sequential, concurrent, both"
            )),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn default_matches_reference_constants() {
        let config = RunConfig::default();

        assert_eq!(config.repetitions_per_worker(), 20);
        assert_eq!(config.concurrency_degree(), 20);
        assert_eq!(config.total_invocations(), 400);
    }

    #[test]
    fn zero_sized_configs_have_no_invocations() {
        assert_eq!(RunConfig::new(0, 10).total_invocations(), 0);
        assert_eq!(RunConfig::new(10, 0).total_invocations(), 0);
        assert_eq!(RunConfig::new(0, 0).total_invocations(), 0);
    }

    #[test]
    fn total_invocations_saturates() {
        assert_eq!(RunConfig::new(u64::MAX, 2).total_invocations(), u64::MAX);
    }

    #[test]
    fn invocation_indexes_are_dense_and_unique() {
        let config = RunConfig::new(7, 5);

        let indexes = (0..config.concurrency_degree())
            .flat_map(|worker| {
                (0..config.repetitions_per_worker())
                    .map(move |repetition| config.invocation_index(worker, repetition))
            })
            .collect::<HashSet<_>>();

        assert_eq!(indexes, (0..35).collect::<HashSet<_>>());
    }

    #[test]
    fn mode_labels() {
        assert_eq!(Mode::Sequential.to_string(), "Single-threaded");
        assert_eq!(Mode::Concurrent.to_string(), "Multi-threaded");
    }

    #[test]
    fn mode_selection_parses_case_insensitively() {
        assert_eq!(
            "Sequential".parse::<ModeSelection>().unwrap(),
            ModeSelection::Sequential
        );
        assert_eq!(
            "CONCURRENT".parse::<ModeSelection>().unwrap(),
            ModeSelection::Concurrent
        );
        assert_eq!("both".parse::<ModeSelection>().unwrap(), ModeSelection::Both);
        assert!("parallel".parse::<ModeSelection>().is_err());
    }

    #[test]
    fn mode_selection_orders_sequential_first() {
        assert_eq!(
            ModeSelection::Both.modes(),
            &[Mode::Sequential, Mode::Concurrent]
        );
        assert_eq!(ModeSelection::default(), ModeSelection::Both);
    }

    #[test]
    fn profile_override_keeps_other_fields() {
        let profile = WorkloadProfile::REFERENCE.with_matrix_size(8);

        assert_eq!(profile.matrix_size, 8);
        assert_eq!(profile.sort_len, WorkloadProfile::REFERENCE.sort_len);
    }
}

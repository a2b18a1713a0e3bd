use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::hint::black_box;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{TaskError, WorkloadProfile};

/// Characters of the processed string carried into the JSON record.
const PROCESSED_STRING_SAMPLE_LEN: usize = 100;

/// Upper bound (exclusive) of the values in the array that gets sorted and searched.
const SORT_VALUE_RANGE: i32 = 1_000_000;

/// One unit of synthetic work, identified by an invocation index.
///
/// Implementations must be callable from many threads at once without sharing mutable state
/// between invocations. Any side effect that touches a shared resource (such as a file) must be
/// keyed by the index so that concurrent invocations never collide.
///
/// Closures taking the index implement this trait, which is handy for counting stubs:
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use load_compare::TaskRunner;
///
/// let calls = AtomicU64::new(0);
/// let task = |_index: u64| {
///     calls.fetch_add(1, Ordering::Relaxed);
/// };
///
/// task.run(0);
/// task.run(1);
/// assert_eq!(calls.load(Ordering::Relaxed), 2);
/// ```
pub trait TaskRunner: Sync {
    /// Performs one invocation. Must not panic under normal conditions.
    fn run(&self, index: u64);
}

impl<F> TaskRunner for F
where
    F: Fn(u64) + Sync,
{
    #[inline]
    fn run(&self, index: u64) {
        self(index);
    }
}

/// The record that each invocation serializes, writes to its scratch file and reads back.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub struct TaskOutput {
    /// Invocation index that produced this record.
    pub id: u64,

    /// Final value of the trigonometric/exponential series.
    pub math_result: f64,

    /// The first three diagonal elements of the matrix product.
    pub matrix_sample: [f64; 3],

    /// Prefix of the processed string.
    pub processed_string: String,
}

/// The bundled CPU, memory and I/O consuming task.
///
/// Each invocation runs a fixed sequence of filler steps sized by a [`WorkloadProfile`] and
/// writes, reads back and deletes the scratch file `task_output_{index}.json` in its scratch
/// directory.
///
/// # Examples
///
/// ```
/// use load_compare::{SyntheticTask, WorkloadProfile};
///
/// let scratch = tempfile::tempdir().unwrap();
/// let task = SyntheticTask::new(WorkloadProfile::TINY, scratch.path());
///
/// let output = task.try_run(42).unwrap();
/// assert_eq!(output.id, 42);
/// assert!(!task.scratch_path(42).exists());
/// ```
#[derive(Clone, Debug)]
pub struct SyntheticTask {
    profile: WorkloadProfile,
    scratch_dir: PathBuf,
}

impl SyntheticTask {
    /// Creates a task with the given sizing that places scratch files in `scratch_dir`.
    #[must_use]
    pub fn new(profile: WorkloadProfile, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// The sizing of each invocation.
    #[must_use]
    pub fn profile(&self) -> &WorkloadProfile {
        &self.profile
    }

    /// The directory that receives scratch files.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path of the scratch file owned by the invocation with the given index.
    #[must_use]
    pub fn scratch_path(&self, index: u64) -> PathBuf {
        self.scratch_dir.join(format!("task_output_{index}.json"))
    }

    /// Performs one invocation and reports any failure of the JSON or file steps.
    ///
    /// The scratch file is removed whenever it was created, even if a later step failed. A file
    /// with the same name that was already present is reported and removed as well. The record
    /// is parsed back even when a file step failed (from empty input if nothing was read), so a
    /// failing invocation does the same amount of work as a successful one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Io`] if the scratch file cannot be created (including when a file
    /// with the same name already exists), written, read or removed, and
    /// [`TaskError::Json`] if the record cannot be serialized or parsed back. A file error takes
    /// precedence over the parse error it causes.
    pub fn try_run(&self, index: u64) -> Result<TaskOutput, TaskError> {
        let math_result = series(index, self.profile.series_terms);
        let matrix_sample = matrix_product_diagonal(self.profile.matrix_size);
        let processed_string = build_string(index, self.profile.string_segments);

        exercise_set(self.profile.set_size);
        sort_and_search(index, self.profile.sort_len);

        let output = TaskOutput {
            id: index,
            math_result,
            matrix_sample,
            processed_string: processed_string
                .chars()
                .take(PROCESSED_STRING_SAMPLE_LEN)
                .collect(),
        };

        let json = serde_json::to_string(&output)?;
        let (read_back, file_result) =
            round_trip_scratch_file(&self.scratch_path(index), json.as_bytes());

        let parsed = parse_record(&read_back);
        file_result?;

        Ok(parsed?)
    }
}

impl TaskRunner for SyntheticTask {
    fn run(&self, index: u64) {
        if let Err(error) = self.try_run(index) {
            trace!(index, %error, "discarding synthetic task failure");
        }
    }
}

/// Creates `path` exclusively, writes `contents`, reads the file back and deletes it.
///
/// Returns what was read (empty if the read did not happen) together with the first failure.
/// Creation fails with `AlreadyExists` if a file with the same name is present. That file is
/// removed before returning so a leftover of an interrupted run fails only one invocation.
fn round_trip_scratch_file(path: &Path, contents: &[u8]) -> (String, Result<(), TaskError>) {
    let io_error = |source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(error) => {
            if error.kind() == io::ErrorKind::AlreadyExists {
                _ = fs::remove_file(path);
            }

            return (String::new(), Err(io_error(error)));
        }
    };

    let written = file.write_all(contents);
    drop(file);

    let read_back = written.and_then(|()| fs::read_to_string(path));
    let removed = fs::remove_file(path);

    match read_back {
        Ok(read_back) => (read_back, removed.map_err(io_error)),
        Err(error) => (String::new(), Err(io_error(error))),
    }
}

#[cfg(test)]
thread_local! {
    static RECORD_PARSE_COUNT: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

fn parse_record(json: &str) -> serde_json::Result<TaskOutput> {
    #[cfg(test)]
    RECORD_PARSE_COUNT.set(RECORD_PARSE_COUNT.get().wrapping_add(1));

    serde_json::from_str(json)
}

fn series(index: u64, terms: u32) -> f64 {
    // Seeding with the index keeps the optimizer from folding the whole series to a constant.
    #[expect(
        clippy::cast_precision_loss,
        reason = "any nearby float is an equally good seed"
    )]
    let mut result = black_box(index as f64) * 1e-9;

    for j in 1..=terms {
        let j = f64::from(j);
        result += j.sqrt() + j.powf(1.8) + j.sin() * j.cos();
        result *= (-j / 100.0).exp() + (j / 50.0).tan();
    }

    result
}

/// Multiplies two generated `size` x `size` matrices and returns the first three diagonal
/// elements of the product (zero where the matrix is smaller than that).
fn matrix_product_diagonal(size: u32) -> [f64; 3] {
    let n = size as usize;

    let a = (0..size)
        .flat_map(|x| {
            (0..size).map(move |y| {
                let (x, y) = (f64::from(x), f64::from(y));
                (x + y).sin() * (x - y).cos()
            })
        })
        .collect::<Vec<_>>();

    // Stored transposed so each product element is a dot product of two contiguous rows.
    let b_transposed = (0..size)
        .flat_map(|y| {
            (0..size).map(move |x| {
                let (x, y) = (f64::from(x), f64::from(y));
                (-(x * y) / 500.0).exp() + (y + 1.0).tan()
            })
        })
        .collect::<Vec<_>>();

    let product = a
        .chunks_exact(n.max(1))
        .flat_map(|row| {
            b_transposed
                .chunks_exact(n.max(1))
                .map(move |column| row.iter().zip(column).map(|(l, r)| l * r).sum::<f64>())
        })
        .collect::<Vec<f64>>();

    let mut diagonal = [0.0; 3];
    for (slot, value) in diagonal
        .iter_mut()
        .zip(product.iter().step_by(n.saturating_add(1)))
    {
        *slot = *value;
    }

    black_box(diagonal)
}

fn build_string(index: u64, segments: u32) -> String {
    (0..segments)
        .map(|j| format!("Task-{index}-Line-{j};"))
        .collect::<String>()
        .replace("Line", "ProcessedLine")
}

fn exercise_set(size: u32) {
    let set = (0..size).collect::<HashSet<_>>();

    for j in 0..size {
        black_box(set.contains(&j));
    }
}

fn sort_and_search(index: u64, len: u32) {
    let mut rng = SmallRng::seed_from_u64(index);

    let mut values = (0..len)
        .map(|_| rng.random_range(0..SORT_VALUE_RANGE))
        .collect::<Vec<_>>();
    values.sort_unstable();

    let target = rng.random_range(0..SORT_VALUE_RANGE);
    _ = black_box(values.binary_search(&target));
}

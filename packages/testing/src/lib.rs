#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests and benches of the `load_compare` package.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

/// Timeout applied by [`with_watchdog()`].
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a test on a separate thread and fails it if it does not finish within
/// [`DEFAULT_WATCHDOG_TIMEOUT`].
///
/// A harness that never reaches its join barrier would otherwise hang the test binary.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled and
/// the test function runs directly, so that mutation testing can detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout. Panics from the test itself are propagated.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    with_watchdog_for(DEFAULT_WATCHDOG_TIMEOUT, test_fn)
}

/// Like [`with_watchdog()`] but with a caller-chosen timeout.
///
/// # Panics
///
/// Panics if the test exceeds `timeout`. Panics from the test itself are propagated.
pub fn with_watchdog_for<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        // If the receiver has already timed out there is nobody left to tell.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread already sent its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {timeout:?} watchdog timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected without a result"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A temporary directory for scratch files that can report what was left behind in it.
///
/// The directory and anything in it are deleted on drop.
#[derive(Debug)]
pub struct ScratchDir {
    inner: TempDir,
}

impl ScratchDir {
    /// Creates a fresh, empty scratch directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::Builder::new()
                .prefix("load_compare-")
                .tempdir()
                .expect("temporary directory must be creatable in tests"),
        }
    }

    /// Path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Entries currently present in the directory, sorted by path.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be listed.
    #[must_use]
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut entries = fs::read_dir(self.path())
            .expect("scratch directory must be readable")
            .map(|entry| entry.expect("directory entry must be readable").path())
            .collect::<Vec<_>>();

        entries.sort();
        entries
    }

    /// Asserts that nothing was left behind in the directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory is not empty.
    pub fn assert_empty(&self) {
        let leftovers = self.leftover_files();

        assert!(
            leftovers.is_empty(),
            "scratch directory must be empty but contains {leftovers:?}"
        );
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}

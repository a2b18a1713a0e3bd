use std::time::Instant;
use std::{io, thread};

use tracing::debug;

use crate::{Comparison, Error, Mode, ModeReport, Result, RunConfig, TaskRunner, heap};

/// Runs a [`TaskRunner`] sequentially or across worker threads and times each mode.
///
/// Both modes perform `repetitions_per_worker * concurrency_degree` invocations and pass every
/// invocation a distinct index in `0..total`, computed as
/// `worker * repetitions_per_worker + repetition`.
///
/// # Examples
///
/// ```
/// use load_compare::{Harness, RunConfig, SyntheticTask, WorkloadProfile};
///
/// let scratch = tempfile::tempdir().unwrap();
/// let task = SyntheticTask::new(WorkloadProfile::TINY, scratch.path());
///
/// let harness = Harness::new(RunConfig::new(2, 3), &task);
/// let report = harness.run_concurrent().unwrap();
///
/// assert_eq!(report.invocations(), 6);
/// println!("{report}");
/// ```
#[derive(derive_more::Debug)]
pub struct Harness<'t, T: ?Sized> {
    config: RunConfig,

    #[debug(ignore)]
    task: &'t T,

    #[cfg(test)]
    fail_spawn_of: Option<usize>,
}

impl<'t, T> Harness<'t, T>
where
    T: TaskRunner + ?Sized,
{
    /// Creates a harness that will invoke `task` according to `config`.
    #[must_use]
    pub fn new(config: RunConfig, task: &'t T) -> Self {
        Self {
            config,
            task,
            #[cfg(test)]
            fail_spawn_of: None,
        }
    }

    /// Makes starting the given worker fail as if the operating system refused the thread.
    #[cfg(test)]
    fn failing_spawn_of(mut self, worker: usize) -> Self {
        self.fail_spawn_of = Some(worker);
        self
    }

    /// The configuration every mode uses.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the given mode.
    ///
    /// # Errors
    ///
    /// See [`run_concurrent()`][Self::run_concurrent]. Sequential mode never fails.
    pub fn run(&self, mode: Mode) -> Result<ModeReport> {
        match mode {
            Mode::Sequential => Ok(self.run_sequential()),
            Mode::Concurrent => self.run_concurrent(),
        }
    }

    /// Runs sequential mode and then concurrent mode.
    ///
    /// # Errors
    ///
    /// See [`run_concurrent()`][Self::run_concurrent].
    pub fn compare(&self) -> Result<Comparison> {
        let sequential = self.run_sequential();
        let concurrent = self.run_concurrent()?;

        Ok(Comparison::new(sequential, concurrent))
    }

    /// Invokes the task `concurrency_degree * repetitions_per_worker` times on the calling
    /// thread, timing the whole nested loop.
    pub fn run_sequential(&self) -> ModeReport {
        debug!(config = ?self.config, "sequential mode starting");

        let heap_before = heap::snapshot();
        let start = Instant::now();

        let mut invocations: u64 = 0;

        for worker in 0..self.config.concurrency_degree() {
            invocations = invocations.wrapping_add(self.run_worker(worker));
        }

        let elapsed = start.elapsed();
        let heap_after = heap::snapshot();

        debug!(invocations, ?elapsed, "sequential mode completed");

        ModeReport::new(
            Mode::Sequential,
            invocations,
            elapsed,
            heap_before,
            heap_after,
        )
    }

    /// Starts `concurrency_degree` worker threads that each invoke the task
    /// `repetitions_per_worker` times, and waits for all of them before taking the end time.
    ///
    /// Thread startup is part of the measured time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerSpawn`] if a worker thread cannot be started and
    /// [`Error::WorkerPanicked`] if a worker panics. In both cases every worker that did start
    /// is waited for before returning.
    pub fn run_concurrent(&self) -> Result<ModeReport> {
        debug!(config = ?self.config, "concurrent mode starting");

        let heap_before = heap::snapshot();
        let start = Instant::now();

        let outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.concurrency_degree());
            let mut spawn_error = None;

            for worker in 0..self.config.concurrency_degree() {
                match self.spawn_worker(scope, worker) {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        spawn_error = Some(Error::WorkerSpawn { worker, source });
                        break;
                    }
                }
            }

            // Join barrier: every started worker finishes before anything is reported.
            let mut invocations: u64 = 0;
            let mut panicked = None;

            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(count) => invocations = invocations.wrapping_add(count),
                    Err(_) if panicked.is_none() => {
                        panicked = Some(Error::WorkerPanicked { worker });
                    }
                    Err(_) => {}
                }
            }

            match spawn_error.or(panicked) {
                Some(error) => Err(error),
                None => Ok(invocations),
            }
        });

        let elapsed = start.elapsed();
        let heap_after = heap::snapshot();

        let invocations = outcome?;

        debug!(invocations, ?elapsed, "concurrent mode completed");

        Ok(ModeReport::new(
            Mode::Concurrent,
            invocations,
            elapsed,
            heap_before,
            heap_after,
        ))
    }

    fn spawn_worker<'scope, 'env>(
        &'env self,
        scope: &'scope thread::Scope<'scope, 'env>,
        worker: usize,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, u64>> {
        #[cfg(test)]
        if self.fail_spawn_of == Some(worker) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "thread limit reached",
            ));
        }

        thread::Builder::new()
            .name(format!("load-worker-{worker}"))
            .spawn_scoped(scope, move || self.run_worker(worker))
    }

    /// One worker's share of the run: `repetitions_per_worker` invocations in order.
    fn run_worker(&self, worker: usize) -> u64 {
        let repetitions = self.config.repetitions_per_worker();

        for repetition in 0..repetitions {
            self.task
                .run(self.config.invocation_index(worker, repetition));
        }

        repetitions
    }
}

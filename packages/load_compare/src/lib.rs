#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Synthetic load generator that compares sequential and multithreaded execution of an
//! identical CPU, memory and I/O bound workload.
//!
//! The package is built from three pieces:
//!
//! - [`TaskRunner`] - one opaque unit of work, invoked with an integer index. The bundled
//!   [`SyntheticTask`] burns CPU with math and matrix work, allocates strings and sets,
//!   round-trips a JSON record and writes/reads/deletes one scratch file per invocation.
//! - [`Harness`] - runs a task either sequentially on the calling thread or fanned out across
//!   a set of worker threads, timing each mode and taking heap snapshots around it.
//! - [`HeapTracker`] - an optional global allocator wrapper that makes
//!   [`heap::snapshot()`] return allocation statistics.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use load_compare::{Harness, RunConfig};
//!
//! let calls = AtomicU64::new(0);
//! let task = |_index: u64| {
//!     calls.fetch_add(1, Ordering::Relaxed);
//! };
//!
//! let harness = Harness::new(RunConfig::new(5, 4), &task);
//! let comparison = harness.compare().unwrap();
//!
//! assert_eq!(comparison.sequential().invocations(), 20);
//! assert_eq!(comparison.concurrent().invocations(), 20);
//! assert_eq!(calls.load(Ordering::Relaxed), 40);
//! ```
//!
//! # Known limitation
//!
//! Failures inside the synthetic task (serialization, scratch file I/O) are discarded, the same
//! way the reference benchmark does it. Use [`SyntheticTask::try_run()`] to observe them.

mod config;
mod error;
mod harness;
pub mod heap;
mod report;
mod task;

pub use config::*;
pub use error::*;
pub use harness::*;
pub use heap::{HeapSnapshot, HeapTracker};
pub use report::*;
pub use task::*;

//! Heap statistics for the before/after memory lines of each mode.
//!
//! Statistics are only available when [`HeapTracker`] is installed as the global allocator:
//!
//! ```rust
//! use load_compare::HeapTracker;
//!
//! #[global_allocator]
//! static ALLOCATOR: HeapTracker<std::alloc::System> = HeapTracker::system();
//!
//! fn main() {
//!     let data = vec![0_u8; 4096];
//!
//!     let snapshot = load_compare::heap::snapshot().unwrap();
//!     assert!(snapshot.total_allocated_bytes() >= 4096);
//!     println!("{snapshot}");
//!
//!     drop(data);
//! }
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::sync::atomic::{self, AtomicBool, AtomicU64};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Counters owned by one thread. Other threads only read them when summing a snapshot, so the
/// allocation path never writes to a cache line shared with another worker.
#[derive(Debug)]
struct ThreadCounters {
    allocated_bytes: AtomicU64,
    freed_bytes: AtomicU64,
    allocations: AtomicU64,
}

impl ThreadCounters {
    const fn new() -> Self {
        Self {
            allocated_bytes: AtomicU64::new(0),
            freed_bytes: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_alloc(&self, bytes: u64) {
        self.allocated_bytes
            .fetch_add(bytes, atomic::Ordering::Relaxed);
        self.allocations.fetch_add(1, atomic::Ordering::Relaxed);
    }

    #[inline]
    fn record_free(&self, bytes: u64) {
        self.freed_bytes.fetch_add(bytes, atomic::Ordering::Relaxed);
    }
}

// Counters of exited threads stay here so their allocations remain part of the totals.
static REGISTRY: LazyLock<Mutex<Vec<Arc<ThreadCounters>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

// Set by the first allocation that goes through a `HeapTracker`.
static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    // A raw pointer rather than an `Arc` so thread teardown runs no destructor that could
    // re-enter the allocator. The pointee lives in REGISTRY, which is never cleared.
    static COUNTERS: OnceCell<*const ThreadCounters> = const { OnceCell::new() };

    // True while this thread is registering its counters; allocations made by the
    // registration itself are not recorded.
    static REGISTERING: Cell<bool> = const { Cell::new(false) };
}

fn thread_counters() -> &'static ThreadCounters {
    COUNTERS.with(|cell| {
        if let Some(ptr) = cell.get() {
            // SAFETY: the pointer comes from an Arc held by REGISTRY for the program lifetime.
            return unsafe { &**ptr };
        }

        REGISTERING.set(true);

        let counters = Arc::new(ThreadCounters::new());
        let ptr = Arc::as_ptr(&counters);
        REGISTRY
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(counters);
        _ = cell.set(ptr);

        REGISTERING.set(false);

        // SAFETY: the pointer comes from an Arc held by REGISTRY for the program lifetime.
        unsafe { &*ptr }
    })
}

#[inline]
fn with_counters(f: impl FnOnce(&ThreadCounters)) {
    if REGISTERING.get() {
        return;
    }

    if !INSTALLED.load(atomic::Ordering::Relaxed) {
        INSTALLED.store(true, atomic::Ordering::Relaxed);
    }

    f(thread_counters());
}

#[inline]
fn size_u64(size: usize) -> u64 {
    u64::try_from(size).unwrap_or(u64::MAX)
}

/// A point-in-time view of the process-wide heap counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeapSnapshot {
    live_bytes: u64,
    total_allocated_bytes: u64,
    allocation_count: u64,
}

impl HeapSnapshot {
    #[cfg(test)]
    pub(crate) const fn from_parts(
        live_bytes: u64,
        total_allocated_bytes: u64,
        allocation_count: u64,
    ) -> Self {
        Self {
            live_bytes,
            total_allocated_bytes,
            allocation_count,
        }
    }

    /// Bytes currently allocated and not yet freed.
    #[must_use]
    pub const fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    /// Bytes allocated since the process started, including memory already freed.
    #[must_use]
    pub const fn total_allocated_bytes(&self) -> u64 {
        self.total_allocated_bytes
    }

    /// Number of allocations since the process started.
    #[must_use]
    pub const fn allocation_count(&self) -> u64 {
        self.allocation_count
    }

    /// Counter growth from `earlier` to `self`. Live bytes are taken from `self` as-is.
    #[must_use]
    pub const fn since(&self, earlier: &Self) -> Self {
        Self {
            live_bytes: self.live_bytes,
            total_allocated_bytes: self
                .total_allocated_bytes
                .saturating_sub(earlier.total_allocated_bytes),
            allocation_count: self
                .allocation_count
                .saturating_sub(earlier.allocation_count),
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "megabytes with two decimals do not need every bit"
)]
fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

impl fmt::Display for HeapSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Live = {:.2} MB, TotalAlloc = {:.2} MB, Allocations = {}",
            megabytes(self.live_bytes),
            megabytes(self.total_allocated_bytes),
            self.allocation_count
        )
    }
}

/// Sums the counters of every thread that has allocated through a [`HeapTracker`].
///
/// Returns `None` if no `HeapTracker` is installed as the global allocator.
#[must_use]
pub fn snapshot() -> Option<HeapSnapshot> {
    if !INSTALLED.load(atomic::Ordering::Relaxed) {
        return None;
    }

    Some(sum_registry())
}

fn sum_registry() -> HeapSnapshot {
    let registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);

    let mut allocated: u64 = 0;
    let mut freed: u64 = 0;
    let mut count: u64 = 0;

    for counters in registry.iter() {
        allocated = allocated
            .wrapping_add(counters.allocated_bytes.load(atomic::Ordering::Relaxed));
        freed = freed.wrapping_add(counters.freed_bytes.load(atomic::Ordering::Relaxed));
        count = count.wrapping_add(counters.allocations.load(atomic::Ordering::Relaxed));
    }

    HeapSnapshot {
        // Frees of memory allocated before registration can push this below zero.
        live_bytes: allocated.saturating_sub(freed),
        total_allocated_bytes: allocated,
        allocation_count: count,
    }
}

/// A global allocator wrapper that counts allocated and freed bytes.
///
/// Allocation behavior is delegated unchanged to the wrapped allocator.
///
/// ```rust
/// use load_compare::HeapTracker;
///
/// #[global_allocator]
/// static ALLOCATOR: HeapTracker<std::alloc::System> = HeapTracker::system();
/// ```
pub struct HeapTracker<A: GlobalAlloc> {
    inner: A,
}

impl<A: GlobalAlloc> fmt::Debug for HeapTracker<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapTracker")
            .field("inner", &"<allocator>")
            .finish()
    }
}

impl HeapTracker<System> {
    /// Wraps the system allocator.
    #[must_use]
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

impl<A: GlobalAlloc> HeapTracker<A> {
    /// Wraps the provided allocator.
    #[must_use]
    pub const fn new(allocator: A) -> Self {
        Self { inner: allocator }
    }
}

// SAFETY: every operation is forwarded to the wrapped allocator; tracking only touches atomics
// and the registry, and never hands out memory itself.
unsafe impl<A: GlobalAlloc> GlobalAlloc for HeapTracker<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        with_counters(|c| c.record_alloc(size_u64(layout.size())));

        // SAFETY: forwarded with the caller's guarantees.
        unsafe { self.inner.alloc(layout) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        with_counters(|c| c.record_free(size_u64(layout.size())));

        // SAFETY: forwarded with the caller's guarantees.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        with_counters(|c| c.record_alloc(size_u64(layout.size())));

        // SAFETY: forwarded with the caller's guarantees.
        unsafe { self.inner.alloc_zeroed(layout) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        with_counters(|c| {
            c.record_free(size_u64(layout.size()));
            c.record_alloc(size_u64(new_size));
        });

        // SAFETY: forwarded with the caller's guarantees.
        unsafe { self.inner.realloc(ptr, layout, new_size) }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(HeapTracker<System>: Send, Sync);
    assert_impl_all!(HeapSnapshot: Send, Sync, Copy);

    #[test]
    fn since_subtracts_cumulative_counters() {
        let before = HeapSnapshot::from_parts(100, 1_000, 10);
        let after = HeapSnapshot::from_parts(40, 5_000, 25);

        let delta = after.since(&before);

        assert_eq!(delta.live_bytes(), 40);
        assert_eq!(delta.total_allocated_bytes(), 4_000);
        assert_eq!(delta.allocation_count(), 15);
    }

    #[test]
    fn since_saturates_instead_of_wrapping() {
        let before = HeapSnapshot::from_parts(0, 5_000, 25);
        let after = HeapSnapshot::from_parts(0, 1_000, 10);

        assert_eq!(after.since(&before).total_allocated_bytes(), 0);
    }

    #[test]
    fn display_uses_megabytes() {
        let snapshot = HeapSnapshot::from_parts(1024 * 1024, 3 * 1024 * 1024 / 2, 7);

        assert_eq!(
            snapshot.to_string(),
            "Live = 1.00 MB, TotalAlloc = 1.50 MB, Allocations = 7"
        );
    }

    #[test]
    fn registered_counters_are_summed() {
        // Unit tests do not install the tracker, so record directly and check the sum grows.
        let before = sum_registry();

        thread_counters().record_alloc(4096);
        thread_counters().record_free(1024);

        let after = sum_registry();

        assert!(after.total_allocated_bytes() >= before.total_allocated_bytes() + 4096);
        assert!(after.allocation_count() > before.allocation_count());
    }
}

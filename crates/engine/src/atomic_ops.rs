//! Atomic primitives shared by the partitioned edge-map driver.
//!
//! Beyond the fetch-add already provided by [`crate::index::Idx`], operators
//! need a compare-and-swap and an atomic write-min over arbitrary vertex-id
//! and distance types, plus an atomic write-add over `f64` for PageRank-style
//! accumulation. `atomic::Atomic<T>` gives us CAS for any `Copy` word-sized
//! type; `write_min` builds on it with a compare-exchange retry loop, the
//! same shape as the `fetch_add` retry loop already used by `Idx`.

use atomic::{Atomic, Ordering};
use atomic_float::AtomicF64;

/// Atomically sets `slot` to `value` if `value < slot`, retrying under
/// contention. Returns `true` if this call performed the write.
///
/// This is the `writeMin` primitive referenced in the concurrency model:
/// it is commutative and idempotent, so concurrent writers converge to the
/// same minimum regardless of visit order.
pub fn write_min<T>(slot: &Atomic<T>, value: T) -> bool
where
    T: Copy + PartialOrd,
{
    let mut current = slot.load(Ordering::Relaxed);
    while value < current {
        match slot.compare_exchange_weak(
            current,
            value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return true,
            Err(observed) => current = observed,
        }
    }
    false
}

/// Atomically adds `value` to the `f64` stored at `slot`.
///
/// Used by pull-mode reductions (e.g. PageRank's rank accumulation) where
/// many sources write-add into the same destination concurrently.
pub fn write_add_f64(slot: &AtomicF64, value: f64) {
    slot.fetch_add(value, Ordering::Relaxed);
}

/// Compare-and-swap helper used by the duplicate remover (§4.5.4): a slot
/// starts at `expected` and the first writer to observe that value wins.
pub fn cas<T>(slot: &Atomic<T>, expected: T, new: T) -> bool
where
    T: Copy + PartialEq,
{
    slot.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

use std::sync::atomic::{
    AtomicU64,
    Ordering::{AcqRel, Acquire},
};
use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::debug_delay::debug_delay;

/// Counter values at or above this signal that an exclusive
/// holder is present or pending. The low 32 bits count
/// outstanding fast-path shared holders.
const EXCLUSIVE_BIAS: u64 = 1 << 32;
const SHARED_MASK: u64 = EXCLUSIVE_BIAS - 1;

/// Shared/exclusive lock with a fast path for shared
/// acquisition when no exclusive holder is pending, which for
/// the mapping table is the overwhelmingly common case
/// (address resolution). Exclusive acquisition (inserting or
/// removing mappings) is rare and pays the full cost.
///
/// State is a single atomic counter biased by
/// [`EXCLUSIVE_BIAS`]. An uncontended shared acquire is one
/// `fetch_add` and never touches the mutex, the condvar, or
/// the backstop `RwLock`. A shared acquire that observes the
/// bias backs its increment out and falls back to the
/// conventional reader lock, which is mutually exclusive with
/// the writer lock every exclusive holder takes.
///
/// Memory ordering: all counter updates are `AcqRel` so that
/// the shared increment is sequenced before the bias check,
/// the exclusive bias addition is visible to every shared
/// acquirer before the drain wait begins, and a departing
/// reader's decrement is visible to the waiter's `Acquire`
/// re-check under the mutex.
///
/// Not useful (and likely slower) if exclusive acquisition is
/// frequent.
#[derive(Default)]
pub struct OptimisticLock {
    x: AtomicU64,
    mu: Mutex<()>,
    done_shared: Condvar,
    backstop: RwLock<()>,
}

impl OptimisticLock {
    pub fn new() -> OptimisticLock {
        OptimisticLock::default()
    }

    /// Shared acquisition. Uncontended, this is a single
    /// atomic increment.
    #[must_use]
    pub fn shared(&self) -> SharedGuard<'_> {
        debug_delay();
        let res = self.x.fetch_add(1, AcqRel) + 1;
        if res < EXCLUSIVE_BIAS {
            return SharedGuard {
                lock: self,
                slow: None,
            };
        }

        // an exclusive holder is present or pending: get out of
        // its way, then queue on the conventional reader lock
        self.decrement();
        debug_delay();
        let reader = self.backstop.read().unwrap();
        SharedGuard {
            lock: self,
            slow: Some(reader),
        }
    }

    /// Exclusive acquisition. Publishes the bias, waits for
    /// in-flight fast-path readers to drain, then takes the
    /// writer side of the backstop lock to exclude slow-path
    /// readers.
    #[must_use]
    pub fn exclusive(&self) -> ExclusiveGuard<'_> {
        let prev = self.x.fetch_add(EXCLUSIVE_BIAS, AcqRel);
        debug_delay();
        if prev & SHARED_MASK != 0 {
            // fast-path readers were active at the instant the
            // bias landed; each departing one notifies
            let mut mu = self.mu.lock().unwrap();
            while self.x.load(Acquire) & SHARED_MASK != 0 {
                mu = self.done_shared.wait(mu).unwrap();
            }
            drop(mu);
        }
        debug_delay();
        let writer = self.backstop.write().unwrap();
        ExclusiveGuard {
            lock: self,
            _writer: writer,
        }
    }

    /// Retires one fast-path shared hold. If that leaves zero
    /// fast-path readers while the exclusive bias is set, the
    /// waiting exclusive holder is woken. The notification is
    /// made under the paired mutex so it cannot land between
    /// the waiter's re-check and its wait.
    fn decrement(&self) {
        debug_delay();
        let res = self.x.fetch_sub(1, AcqRel) - 1;
        if res >= EXCLUSIVE_BIAS && res & SHARED_MASK == 0 {
            // writer(s) await, and we were the last fast-path
            // reader: wake them
            let _mu = self.mu.lock().unwrap();
            self.done_shared.notify_all();
        }
    }
}

impl std::fmt::Debug for OptimisticLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let x = self.x.load(Acquire);
        f.debug_struct("OptimisticLock")
            .field("fast_path_readers", &(x & SHARED_MASK))
            .field("exclusive_pending", &(x >= EXCLUSIVE_BIAS))
            .finish()
    }
}

/// Scoped shared hold; releases on drop on every exit path.
#[must_use]
pub struct SharedGuard<'a> {
    lock: &'a OptimisticLock,
    /// `Some` when the acquisition fell back to the
    /// conventional reader lock; releasing that guard is the
    /// whole release in that case.
    slow: Option<RwLockReadGuard<'a, ()>>,
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        if self.slow.is_none() {
            self.lock.decrement();
        }
    }
}

/// Scoped exclusive hold; releases on drop on every exit path.
#[must_use]
pub struct ExclusiveGuard<'a> {
    lock: &'a OptimisticLock,
    _writer: RwLockWriteGuard<'a, ()>,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        // retract the bias first, then the field drop releases
        // the writer lock
        self.lock.x.fetch_sub(EXCLUSIVE_BIAS, AcqRel);
    }
}

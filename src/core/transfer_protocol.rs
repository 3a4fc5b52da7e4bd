//! Two-guard acquisition protocol shared by every fine-grained strategy
//!
//! A transfer touches two accounts and therefore needs two guards. Deadlock
//! freedom rests on a single rule: guards are acquired in a global total order
//! over their identity (the index of the guard in the strategy's guard array),
//! never in argument order. Two transfers in opposite directions between the
//! same accounts therefore both lock the lower index first, so no cycle of
//! waiting threads can form.
//!
//! ```text
//! transfer(a -> b)       transfer(b -> a)
//!   lock min(a, b)         lock min(a, b)   <- one waits here
//!   lock max(a, b)         lock max(a, b)
//!   release max            release max
//!   release min            release min
//! ```
//!
//! When both keys collapse onto the same guard (a pooled strategy mapping two
//! accounts onto one slot) the guard is taken once; taking it twice would
//! deadlock the calling thread on a non-reentrant mutex.

use parking_lot::{Mutex, MutexGuard};

/// One guard in a [`GuardPair`] request: its key in the global order and the
/// mutex itself
pub type OrderedGuard<'a, K, T> = (K, &'a Mutex<T>);

/// Guards held for the duration of a two-account operation
///
/// Guards are released in reverse acquisition order when the pair is dropped,
/// including on early `?` returns from validation.
#[derive(Debug)]
pub struct GuardPair<'a, T> {
    // Declared before `lower` so it is dropped first.
    upper: Option<MutexGuard<'a, T>>,
    lower: MutexGuard<'a, T>,
    src_is_lower: bool,
}

impl<'a, T> GuardPair<'a, T> {
    /// Acquire the guards covering `src` and `dst` in ascending key order
    ///
    /// If both requests carry the same key only one guard is acquired. The
    /// caller must pass the same mutex for equal keys.
    pub fn acquire<K: Ord>(src: OrderedGuard<'a, K, T>, dst: OrderedGuard<'a, K, T>) -> Self {
        let (src_key, src_lock) = src;
        let (dst_key, dst_lock) = dst;

        if src_key == dst_key {
            debug_assert!(std::ptr::eq(src_lock, dst_lock));
            return GuardPair {
                upper: None,
                lower: src_lock.lock(),
                src_is_lower: true,
            };
        }

        let src_is_lower = src_key < dst_key;
        let (first, second) = if src_is_lower {
            (src_lock, dst_lock)
        } else {
            (dst_lock, src_lock)
        };

        let lower = first.lock();
        let upper = second.lock();
        GuardPair {
            upper: Some(upper),
            lower,
            src_is_lower,
        }
    }

    /// Whether both requests were covered by a single guard
    pub fn is_shared(&self) -> bool {
        self.upper.is_none()
    }

    /// Mutable access to the source and destination values
    ///
    /// Returns `None` when a single guard covers both sides.
    pub fn split_mut(&mut self) -> Option<(&mut T, &mut T)> {
        let upper = self.upper.as_deref_mut()?;
        let lower = &mut *self.lower;
        if self.src_is_lower {
            Some((lower, upper))
        } else {
            Some((upper, lower))
        }
    }
}

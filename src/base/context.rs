//! Execution context identity for pool partitioning.
//!
//! Each virtual-user execution context gets its own private sub-pool per
//! endpoint; [`ContextId`] is the opaque key that makes that split.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Opaque, stable identity of a calling execution context.
///
/// By default the identity is per OS thread: the first call to
/// [`ContextId::current`] on a thread assigns it a fresh id which every later
/// call on that thread returns. Callers running as tasks that may migrate
/// between threads should instead allocate an id once ([`ContextId::next`])
/// and carry it across awaits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// The identity of the calling thread, assigned lazily on first use.
    pub fn current() -> Self {
        CURRENT.with(|cell| match cell.get() {
            Some(id) => ContextId(id),
            None => {
                let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(Some(id));
                ContextId(id)
            }
        })
    }

    /// Allocate a fresh identity, detached from any thread.
    pub fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an identity from a raw value obtained via [`ContextId::as_u64`].
    pub fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_a_thread() {
        assert_eq!(ContextId::current(), ContextId::current());
    }

    #[test]
    fn distinct_across_threads() {
        let here = ContextId::current();
        let there = std::thread::spawn(ContextId::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn next_never_repeats() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
    }
}

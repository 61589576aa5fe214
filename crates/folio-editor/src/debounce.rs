//! Keyed debounce timers.
//!
//! Each key holds at most one pending timer. Scheduling again replaces (and
//! aborts) the previous one and bumps the key's generation, so a timer that
//! already fired into a channel can be recognised as stale by its owner.
//! Dropping the debouncer aborts every pending timer.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// A map of per-key timers with explicit cancellation.
pub struct Debouncer<K> {
    delay: Duration,
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Requires a running tokio runtime when timers are scheduled.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_generation: 0,
            pending: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer for `key`. `fire` runs once the delay elapses
    /// without another `schedule` for the same key, and receives the
    /// generation to check with [`Debouncer::is_current`].
    pub fn schedule<F>(&mut self, key: K, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.next_generation += 1;
        let generation = self.next_generation;
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(generation);
        });

        if let Some(old) = self.pending.insert(key.clone(), Pending { generation, handle }) {
            old.handle.abort();
            trace!(?key, replaced = old.generation, generation, "debounce timer reset");
        } else {
            trace!(?key, generation, "debounce timer started");
        }
        generation
    }

    /// Whether `generation` is still the live timer for `key`.
    pub fn is_current(&self, key: &K, generation: u64) -> bool {
        self.pending
            .get(key)
            .is_some_and(|p| p.generation == generation)
    }

    /// Forget the timer for `key` after it fired. Returns false for a stale
    /// generation, in which case nothing changes.
    pub fn complete(&mut self, key: &K, generation: u64) -> bool {
        if self.is_current(key, generation) {
            self.pending.remove(key);
            true
        } else {
            false
        }
    }

    /// Abort the timer for `key`, if any.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, p) in self.pending.drain() {
            p.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, p) in self.pending.drain() {
            p.handle.abort();
        }
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicU64>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicU64::new(0)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_fire_once() {
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        let (fired, last_gen) = counter();

        let mut last = 0;
        for _ in 0..5 {
            let (f, g) = (fired.clone(), last_gen.clone());
            last = debouncer.schedule("doc", move |generation| {
                f.fetch_add(1, Ordering::SeqCst);
                g.store(generation, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last_gen.load(Ordering::SeqCst), last);
        assert!(debouncer.complete(&"doc", last));
        assert!(!debouncer.is_pending(&"doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let (fired, _) = counter();

        for key in ["a", "b"] {
            let f = fired.clone();
            debouncer.schedule(key, move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_abort_timers() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let (fired, _) = counter();

        let f = fired.clone();
        debouncer.schedule(1u32, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.cancel(&1));
        assert!(!debouncer.cancel(&1));

        let f = fired.clone();
        debouncer.schedule(2u32, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        drop(debouncer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_rejected() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let first = debouncer.schedule("k", |_| {});
        let second = debouncer.schedule("k", |_| {});
        assert!(!debouncer.is_current(&"k", first));
        assert!(!debouncer.complete(&"k", first));
        assert!(debouncer.complete(&"k", second));
    }
}

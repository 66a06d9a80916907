use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant, sleep, sleep_until};

/// Longest single wait the schedulers will arm. Mirrors the 32-bit millisecond
/// limit of common timer APIs so long delays are walked in bounded steps.
pub const MAX_TIMER: Duration = Duration::from_millis(i32::MAX as u64);

/// Sleeps until `deadline`, never arming a single wait longer than `cap`.
/// Each wake re-evaluates the remaining time.
pub async fn sleep_capped(deadline: Instant, cap: Duration) {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining > cap {
            sleep(cap).await;
            continue;
        }
        sleep_until(deadline).await;
        return;
    }
}

/// At most one pending task per key; arming a key again aborts the old task.
pub struct TimerSet<K> {
    pending: Arc<DashMap<K, (u64, AbortHandle)>>,
    generation: AtomicU64,
}

impl<K> TimerSet<K>
where
    K: std::hash::Hash + Eq + Copy + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs `task` after `delay`, replacing any timer already armed for `key`.
    pub fn arm<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let job = async move {
            sleep(delay).await;
            // Drop our own entry before running so the task can re-arm the key.
            pending.remove_if(&key, |_, (g, _)| *g == generation);
            task.await;
        };

        // The entry stays locked until the handle is stored, so even a task
        // that finishes at once cannot leave a stale entry behind.
        match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                let handle = tokio::spawn(job).abort_handle();
                let (_, previous) = slot.insert((generation, handle));
                previous.abort();
            }
            Entry::Vacant(slot) => {
                let handle = tokio::spawn(job).abort_handle();
                slot.insert((generation, handle));
            }
        }
    }

    /// Arms `task` only when nothing is pending for `key`. Returns whether it armed.
    pub fn arm_once<F>(&self, key: K, run: impl FnOnce(u64) -> F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        match self.pending.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let pending = self.pending.clone();
                let task = run(generation);
                let handle = tokio::spawn(async move {
                    task.await;
                    pending.remove_if(&key, |_, (g, _)| *g == generation);
                });
                slot.insert((generation, handle.abort_handle()));
                true
            }
        }
    }

    /// Aborts the pending timer for `key`. Returns false if none was armed.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, (_, handle))) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }
}

impl<K> Default for TimerSet<K>
where
    K: std::hash::Hash + Eq + Copy + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

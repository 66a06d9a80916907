use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutexes for check-then-act sequences that span platform calls.
/// An entry lives only while someone holds or waits on it.
pub struct KeyedLocks<K: Hash + Eq> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

pub struct KeyedGuard<'a, K: Hash + Eq> {
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Hash + Eq> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means the map is the last owner.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K: Hash + Eq + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }
}

impl<K: Hash + Eq + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let guard = locks.lock(1).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different key is independent.
        let _other = locks.lock(2).await;

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn released_keys_are_evicted() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let guard = locks.lock(1).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still needs the entry after the first holder lets go.
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.locks.len(), 0);

        for user in 0..100 {
            let _g = locks.lock(user).await;
        }
        assert_eq!(locks.locks.len(), 0);
    }
}

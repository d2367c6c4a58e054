//! Keyed single-flight execution.
//!
//! The first caller for a key runs the work; callers arriving while it is
//! outstanding wait on a `watch` channel and receive a clone of the same
//! result. Nothing is remembered once the work finishes; caching is the
//! caller's job.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Recover data even if a panic poisoned the lock; every critical
    // section leaves the map consistent.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct Flights<K, V> {
    inflight: Mutex<HashMap<K, watch::Receiver<Option<V>>>>,
}

impl<K, V> Flights<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Flights {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys with work outstanding.
    pub(crate) fn len(&self) -> usize {
        lock(&self.inflight).len()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    /// Detach any outstanding work for `key`. The running leader still
    /// completes and delivers to callers already waiting, but new callers
    /// start fresh work.
    pub(crate) fn forget(&self, key: &K) {
        lock(&self.inflight).remove(key);
    }

    /// Run `work` for `key`, or join the run already in progress.
    ///
    /// If the leading caller is dropped before finishing, one of the
    /// waiting callers takes over and runs its own `work`.
    pub(crate) async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let tx = loop {
            let mut rx = {
                let mut map = lock(&self.inflight);
                match map.get(&key) {
                    Some(rx) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        map.insert(key.clone(), rx);
                        break tx;
                    }
                }
            };

            let published = match rx.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            };
            if let Some(value) = published {
                return value;
            }
            // Leader dropped without publishing; its guard has released the key.
        };

        let guard = Leader {
            flights: self,
            key: &key,
            tx,
        };
        let value = work().await;
        guard.tx.send_replace(Some(value.clone()));
        value
    }
}

/// Releases the key when the leading call finishes or is dropped.
struct Leader<'a, K: Eq + Hash, V> {
    flights: &'a Flights<K, V>,
    key: &'a K,
    tx: watch::Sender<Option<V>>,
}

impl<K: Eq + Hash, V> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        let mut map = lock(&self.flights.inflight);
        // Only remove our own entry; `forget` may have let a newer run in.
        if map
            .get(self.key)
            .is_some_and(|rx| rx.same_channel(&self.tx.subscribe()))
        {
            map.remove(self.key);
        }
    }
}

//! Trailing-edge debouncing for keystroke-driven work.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Coalesces bursts of calls per key into one run, `delay` after the last call.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<HashMap<&'static str, Pending>>>,
    generation: Arc<Mutex<u64>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `work` under `key`, dropping whatever was still waiting there.
    ///
    /// Work that has already started is never interrupted.
    pub fn call<F>(&self, key: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Held across the spawn so the timer can never observe the map
        // before its own entry is in it.
        let mut pending = self.pending.lock();
        let generation = {
            let mut counter = self.generation.lock();
            *counter += 1;
            *counter
        };

        let delay = self.delay;
        let shared = self.pending.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = shared.lock();
                if pending.get(key).map(|p| p.generation) != Some(generation) {
                    return;
                }
                pending.remove(key);
            }
            work.await;
        });

        if let Some(previous) = pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Drop every scheduled call that has not fired yet.
    pub fn cancel_all(&self) {
        for (_, p) in self.pending.lock().drain() {
            p.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once_with_last_value() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let runs = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let runs = runs.clone();
            debouncer.call("url", async move {
                runs.lock().push(i);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(runs.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*runs.lock(), vec![4]);
        assert!(!debouncer.is_pending("url"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));
        for key in ["token", "region"] {
            let count = count.clone();
            debouncer.call(key, async move {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        debouncer.call("url", async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel_all();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

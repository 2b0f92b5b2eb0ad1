use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Scheduled {
    generation: u64,
    handle: JoinHandle<()>,
}

type Slots<K> = Arc<Mutex<HashMap<K, Scheduled>>>;

fn lock<K>(slots: &Slots<K>) -> MutexGuard<'_, HashMap<K, Scheduled>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

/// Runs a task once a key has been quiet for `delay`.
///
/// Scheduling a key that already has an unfired task cancels that task. Once a
/// task's timer fires it is detached from the key and always runs to the end;
/// rescheduling never interrupts work that has started.
pub struct Debouncer<K> {
    delay: Duration,
    slots: Slots<K>,
    next_generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let slots = Arc::clone(&self.slots);
        let task_key = key.clone();

        // Held across spawn and insert so the new task cannot observe the
        // map before its own entry is registered.
        let mut guard = lock(&self.slots);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut guard = lock(&slots);
                match guard.get(&task_key) {
                    Some(current) if current.generation == generation => {
                        guard.remove(&task_key);
                    }
                    _ => return,
                }
            }
            task.await;
        });

        if let Some(previous) = guard.insert(key, Scheduled { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancels the unfired task for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.slots).remove(key) {
            Some(scheduled) => {
                scheduled.handle.abort();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.slots).contains_key(key)
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, scheduled) in lock(&self.slots).drain() {
            scheduled.handle.abort();
        }
    }
}

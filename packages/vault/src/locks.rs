use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutex serializing mutations of one instance.
///
/// Entries are created on demand and removed when the last holder or waiter
/// releases them, so the map only ever contains instances being mutated.
#[derive(Clone, Default)]
pub struct InstanceLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance_id`.
    pub async fn lock(&self, instance_id: &str) -> InstanceGuard {
        let mutex = self
            .inner
            .entry(instance_id.to_string())
            .or_default()
            .clone();
        let guard = mutex.lock_owned().await;

        InstanceGuard {
            guard: Some(guard),
            instance_id: instance_id.to_string(),
            locks: self.inner.clone(),
        }
    }

    /// Number of instances currently locked or awaited.
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

pub struct InstanceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    instance_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.instance_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

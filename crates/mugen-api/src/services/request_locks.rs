//! Per-request-id mutual exclusion.
//!
//! Every file a request writes is named after its `request_id`, so two requests
//! sharing an id must not stage concurrently. Requests with different ids never
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct RequestLocks {
    locks: Arc<Mutex<HashMap<String, Weak<AsyncMutex<()>>>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `request_id`. Released when the guard drops.
    pub async fn acquire(&self, request_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries whose lock nobody holds or awaits are dead.
            locks.retain(|_, weak| weak.strong_count() > 0);

            match locks.get(request_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(request_id.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };

        lock.lock_owned().await
    }

    /// Number of request ids currently locked or awaited.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

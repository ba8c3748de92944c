//! Per-user pass serialization.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per user. A pass holds its user's lock from start to
/// finish, so binding creation for a user never races.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `user_id`.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Whether a pass currently holds the lock of `user_id`.
    pub async fn is_locked(&self, user_id: i64) -> bool {
        let locks = self.inner.lock().await;
        locks.get(&user_id).is_some_and(|lock| lock.try_lock().is_err())
    }
}

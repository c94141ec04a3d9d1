//! Per-user mutual exclusion for the trade critical section.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use super::error::LedgerError;

/// Registry of one mutex per user id. Trades for the same user are
/// linearized; trades for different users proceed in parallel. Lock entries
/// are created lazily on first access and never removed, which also makes
/// lazy portfolio provisioning safe under concurrent first access.
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl UserLocks {
    pub fn new(timeout: Duration) -> Self {
        UserLocks {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Run `f` while holding the user's lock. Acquisition is bounded by the
    /// registry timeout; expiry fails with the retryable
    /// [`LedgerError::LockTimeout`] instead of blocking forever.
    pub fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce() -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        // Clone the Arc out so the dashmap shard guard is released before
        // we block on the mutex.
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_default()
            .clone();

        let deadline = Instant::now() + self.timeout;
        loop {
            match lock.try_lock() {
                Ok(_guard) => return f(),
                Err(TryLockError::Poisoned(poisoned)) => {
                    // Portfolio state lives in the store, not in the lock,
                    // so a panicked holder leaves nothing to repair here.
                    let _guard = poisoned.into_inner();
                    return f();
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(LedgerError::LockTimeout {
                            user_id: user_id.to_string(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

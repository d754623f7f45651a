use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per employee id, used to serialize the read-check-write
/// sequence of a leave application.
///
/// Entries idle for longer than the configured TTI are evicted; a guard keeps
/// its own `Arc` alive, so eviction never frees a lock that is still held.
#[derive(Clone)]
pub struct EmployeeLocks {
    locks: Cache<u64, Arc<Mutex<()>>>,
}

impl EmployeeLocks {
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(100_000) // tune based on head count
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Wait until no other task holds the lock for `employee_id`.
    pub async fn acquire(&self, employee_id: u64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(employee_id, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}

impl Default for EmployeeLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_employee_is_serialized() {
        let locks = EmployeeLocks::default();
        let guard = locks.acquire(7).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move { contender.acquire(7).await });

        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn different_employees_do_not_block_each_other() {
        let locks = EmployeeLocks::default();
        let _first = locks.acquire(1).await;
        let _second = locks.acquire(2).await;
    }
}

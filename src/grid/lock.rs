//! Timed exclusive access to shared grid state
//!
//! Waiters give up after a fixed timeout instead of blocking forever. A timeout
//! is logged once and counted; the holder is never forcibly evicted. Work that
//! must not be dropped uses [`TimedMutex::lock_retrying`], which keeps waiting
//! one timeout at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::error;
use tokio::sync::{Mutex, MutexGuard};

use super::errors::{GridError, GridResult};

#[derive(Debug)]
pub struct TimedMutex<T> {
    name: &'static str,
    timeout: Duration,
    inner: Mutex<T>,
    timeouts: AtomicU64,
}

impl<T> TimedMutex<T> {
    pub fn new(name: &'static str, value: T, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            inner: Mutex::new(value),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Acquire the lock or fail with [`GridError::LockTimeout`]
    pub async fn lock(&self) -> GridResult<MutexGuard<'_, T>> {
        match tokio::time::timeout(self.timeout, self.inner.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                let waited_ms = self.timeout.as_millis() as u64;
                let total = self.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    "Lock timeout on {} after {}ms ({} timeouts so far)",
                    self.name, waited_ms, total
                );
                Err(GridError::LockTimeout {
                    table: self.name,
                    waited_ms,
                })
            }
        }
    }

    /// Acquire the lock, retrying after every timeout
    pub async fn lock_retrying(&self) -> MutexGuard<'_, T> {
        loop {
            if let Ok(guard) = self.lock().await {
                return guard;
            }
        }
    }

    /// Number of acquisitions that timed out
    pub fn timeout_count(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lock_uncontended() {
        let mutex = TimedMutex::new("book", 1u32, Duration::from_millis(50));
        {
            let mut guard = mutex.lock().await.unwrap();
            *guard += 1;
        }
        assert_eq!(*mutex.lock().await.unwrap(), 2);
        assert_eq!(mutex.timeout_count(), 0);
    }

    #[tokio::test]
    async fn test_waiter_times_out_once() {
        let mutex = Arc::new(TimedMutex::new("book", (), Duration::from_millis(30)));
        let _held = mutex.lock().await.unwrap();

        let waiter = {
            let mutex = mutex.clone();
            tokio::spawn(async move {
                let result = mutex.lock().await.map(|_| ());
                result
            })
        };
        let result = waiter.await.unwrap();
        match result {
            Err(GridError::LockTimeout { table, waited_ms }) => {
                assert_eq!(table, "book");
                assert_eq!(waited_ms, 30);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(mutex.timeout_count(), 1);
    }

    #[tokio::test]
    async fn test_retrying_waiter_outlasts_timeouts() {
        let mutex = Arc::new(TimedMutex::new("book", 0u32, Duration::from_millis(10)));
        let guard = mutex.lock().await.unwrap();
        let waiter = {
            let mutex = mutex.clone();
            tokio::spawn(async move {
                let mut g = mutex.lock_retrying().await;
                *g += 1;
            })
        };
        tokio::time::sleep(Duration::from_millis(45)).await;
        assert!(mutex.timeout_count() >= 2);
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(*mutex.lock().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lock_available_after_release() {
        let mutex = Arc::new(TimedMutex::new("book", 0u32, Duration::from_millis(500)));
        let guard = mutex.lock().await.unwrap();
        let waiter = {
            let mutex = mutex.clone();
            tokio::spawn(async move {
                let mut g = mutex.lock().await?;
                *g += 1;
                Ok::<_, GridError>(())
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(guard);
        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(*mutex.lock().await.unwrap(), 1);
        assert_eq!(mutex.timeout_count(), 0);
    }
}

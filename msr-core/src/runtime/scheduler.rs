//! Bounded work scheduler shared by the orchestrator and fan-out
//!
//! Guarantees bounded in-flight work per session: each session draws from
//! its own permit pool, so a chatty session cannot starve the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Default concurrent in-flight tasks allowed per session
pub const DEFAULT_SESSION_PERMITS: usize = 32;

/// Per-session bounded scheduler
pub struct Scheduler {
    semaphores: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
    permits_per_session: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_PERMITS)
    }
}

impl Scheduler {
    pub fn new(permits_per_session: usize) -> Self {
        Self {
            semaphores: Mutex::new(HashMap::new()),
            permits_per_session: permits_per_session.max(1),
        }
    }

    fn semaphore(&self, session_id: Uuid) -> Arc<Semaphore> {
        self.semaphores
            .lock()
            .expect("scheduler lock")
            .entry(session_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_session)))
            .clone()
    }

    /// Spawn a task under the session's permit pool.
    pub fn spawn<F>(&self, session_id: Uuid, fut: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let semaphore = self.semaphore(session_id);
        tokio::spawn(async move {
            // The semaphore is never closed; ok() just satisfies the type
            let _permit = semaphore.acquire_owned().await.ok();
            fut.await
        })
    }

    /// Run a future inline under the session's permit pool.
    pub async fn run<F>(&self, session_id: Uuid, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        let semaphore = self.semaphore(session_id);
        let _permit = semaphore.acquire().await.ok();
        fut.await
    }

    /// Drop a session's permit pool (called when the session expires).
    pub fn forget_session(&self, session_id: Uuid) {
        self.semaphores
            .lock()
            .expect("scheduler lock")
            .remove(&session_id);
    }

    /// Number of sessions with live permit pools.
    pub fn tracked_sessions(&self) -> usize {
        self.semaphores.lock().expect("scheduler lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_tasks_complete() {
        let scheduler = Scheduler::new(4);
        let session = Uuid::new_v4();

        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let counter = counter.clone();
            handles.push(scheduler.spawn(session, async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_in_flight_bounded_per_session() {
        let scheduler = Arc::new(Scheduler::new(2));
        let session = Uuid::new_v4();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(scheduler.spawn(session, async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak exceeded permit count");
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let scheduler = Arc::new(Scheduler::new(1));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        // A long task on session A must not block session B
        let _hold = scheduler.spawn(a, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let quick = scheduler.run(b, async { 42 });
        let result = tokio::time::timeout(Duration::from_millis(100), quick)
            .await
            .expect("session B should not be starved");
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_forget_session() {
        let scheduler = Scheduler::new(2);
        let session = Uuid::new_v4();
        scheduler.run(session, async {}).await;
        assert_eq!(scheduler.tracked_sessions(), 1);
        scheduler.forget_session(session);
        assert_eq!(scheduler.tracked_sessions(), 0);
    }
}

//! Session time and the deadline scheduler.
//!
//! The engine never reads a clock; it reports its next deadline and expects
//! `tick(now)` to be called once that deadline passes. A session runs one
//! scheduler task that sleeps until the earliest deadline, fires it, and is
//! woken early whenever a mutation may have moved the deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_engine::Timestamp;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Milliseconds since the session started.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// The instant a session timestamp corresponds to.
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.origin + Duration::from_millis(at)
    }
}

/// A spawned task that is aborted when the handle is cancelled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Something with deadlines.
#[async_trait]
pub trait Timed: Send + Sync {
    /// The earliest pending deadline, if any.
    async fn next_deadline(&self) -> Option<Timestamp>;

    /// Run everything due at `now`. Must clear or move every deadline that
    /// is at or before `now`.
    async fn fire(&self, now: Timestamp);
}

/// Drives a [`Timed`] target from a background task.
#[derive(Debug)]
pub struct Scheduler {
    wake: Arc<Notify>,
    task: TimerHandle,
}

impl Scheduler {
    pub fn spawn(target: Arc<dyn Timed>, clock: SessionClock) -> Self {
        let wake = Arc::new(Notify::new());
        let task = TimerHandle::spawn(run(target, clock, Arc::clone(&wake)));
        Self { wake, task }
    }

    /// Re-read the target's deadline.
    pub fn reschedule(&self) {
        // notify_one stores a permit, so a wake-up sent while the task is
        // busy firing is not lost.
        self.wake.notify_one();
    }

    /// A handle that reschedules from outside the owner, e.g. in a drop guard.
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn run(target: Arc<dyn Timed>, clock: SessionClock, wake: Arc<Notify>) {
    loop {
        match target.next_deadline().await {
            Some(at) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(clock.instant_at(at)) => {
                        target.fire(clock.now().max(at)).await;
                    }
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

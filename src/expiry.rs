//! Background expiry of idle sessions.
//!
//! Sessions abandoned mid-intake would otherwise keep their photos on disk
//! forever. The sweeper wakes periodically and drops every session idle for
//! longer than the configured TTL.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::intake::IntakeService;

/// Handle to the running sweeper. Dropping it stops the task.
pub struct ExpirySweeperHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeperHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(h) = &self.handle {
            h.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExpirySweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
        self.handle.take();
    }
}

/// Spawn the sweeper on the current tokio runtime.
pub fn start_expiry_sweeper(
    intake: Arc<IntakeService>,
    interval: Duration,
    ttl: Duration,
) -> ExpirySweeperHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            ttl_secs = ttl.as_secs(),
            "Session expiry sweeper started"
        );
        sweeper_loop(&intake, &flag, interval, ttl).await;
        tracing::info!("Session expiry sweeper stopped");
    });

    ExpirySweeperHandle {
        shutdown,
        handle: Some(handle),
    }
}

async fn sweeper_loop(intake: &IntakeService, shutdown: &AtomicBool, interval: Duration, ttl: Duration) {
    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(interval).await;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let expired = intake.expire_idle(ttl);
        if expired > 0 {
            tracing::info!(expired, remaining = intake.sessions().len(), "Expired idle sessions");
        }
    }
}

pub mod alert_processor;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Caps how many alert events are being fanned out at once. A consumer
/// loop that calls `spawn` stops pulling new events while every slot is busy.
#[derive(Clone)]
pub struct InFlight {
    permits: Arc<Semaphore>,
    limit: u32,
}

impl InFlight {
    pub fn new(limit: u32) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit as usize)),
            limit,
        }
    }

    /// Waits for a free slot, then runs `task` on its own tokio task.
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            warn!("In-flight limiter closed, dropping alert event");
            return;
        };
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
    }

    /// Resolves once every spawned task has finished.
    pub async fn drain(&self) {
        if let Ok(all) = self.permits.acquire_many(self.limit).await {
            drop(all);
        }
    }

    pub fn active(&self) -> usize {
        self.limit as usize - self.permits.available_permits()
    }
}

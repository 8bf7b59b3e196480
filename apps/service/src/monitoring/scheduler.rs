use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::MonitorEngine;

/// Tick scheduler - drives `MonitorEngine::run_tick` on a fixed interval
///
/// Ticks run one after another on a single task, so two ticks never overlap.
/// A tick that overruns the interval causes the missed ticks to be skipped.
pub struct TickScheduler {
    engine: Arc<MonitorEngine>,
    interval: Duration,
}

impl TickScheduler {
    /// Create a new tick scheduler
    pub fn new(engine: Arc<MonitorEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run ticks until `shutdown` resolves. Returns the number of ticks run.
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Tick scheduler stopping after {} ticks", ticks);
                    return ticks;
                }
                _ = timer.tick() => {
                    ticks += 1;
                    match self.engine.run_tick().await {
                        Ok(summary) => debug!("Tick {} completed: {}", ticks, summary),
                        Err(e) => warn!("Tick {} failed: {:#}", ticks, e),
                    }
                }
            }
        }
    }

    /// Start the scheduler as a background task that runs until `shutdown` resolves
    pub fn spawn<F>(self, shutdown: F) -> tokio::task::JoinHandle<u64>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.run_until(shutdown).await })
    }
}

use crate::prelude::*;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Work run on every scheduler tick.
#[async_trait]
pub trait TickHandler: Send {
    async fn on_tick(&mut self);
}

/// Fixed-interval loop. A tick that overruns delays the following ones
/// rather than firing a burst to catch up.
pub struct Scheduler {
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            interval,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Tick until shutdown is signalled. Shutdown is only noticed between
    /// ticks, a running tick always finishes.
    pub async fn run<T>(&mut self, handler: &mut T)
    where
        T: TickHandler + ?Sized,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("scheduler received shutdown signal");
                    break;
                }
                _ = interval.tick() => handler.on_tick().await,
            }
        }
    }
}

//! Periodic tick loop

use super::orchestrator::Orchestrator;
use crate::config::SchedulerConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Scheduler state
pub struct Scheduler {
    config: SchedulerConfig,
    orchestrator: Arc<Orchestrator>,
    tick_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    shutdown: Notify,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        config: SchedulerConfig,
        orchestrator: Arc<Orchestrator>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (tick_tx, tick_rx) = mpsc::channel(10);

        let scheduler = Arc::new(Self {
            config,
            orchestrator,
            tick_tx,
            running: Arc::new(RwLock::new(false)),
            shutdown: Notify::new(),
        });

        (scheduler, tick_rx)
    }

    /// Trigger an immediate tick
    pub async fn trigger_tick(&self) {
        let _ = self.tick_tx.send(()).await;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run ticks until [`Scheduler::stop`] is called. Ticks never overlap.
    pub async fn start(self: Arc<Self>, mut tick_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = self.config.tick_interval_secs,
            batch_size = self.config.batch_size,
            "Scheduler started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.tick_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = ticker.tick() => self.tick("interval").await,
                Some(_) = tick_rx.recv() => self.tick("trigger").await,
                else => break,
            }

            if !self.is_running().await {
                break;
            }
        }

        {
            let mut running = self.running.write().await;
            *running = false;
        }
        tracing::info!("Scheduler stopped");
    }

    /// Stop the scheduler after the current tick
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            *running = false;
        }
        self.shutdown.notify_one();
    }

    async fn tick(&self, cause: &'static str) {
        if let Err(e) = self.orchestrator.run_tick(self.config.batch_size).await {
            tracing::error!(cause = cause, error = %e, "Onboarding tick failed");
        }
    }
}

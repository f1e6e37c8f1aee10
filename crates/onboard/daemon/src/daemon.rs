//! Daemon setup and lifecycle management

use crate::collaborators::Collaborators;
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::lease::{InMemoryLeaseManager, LeaseManager, PostgresLeaseManager};
use crate::scheduler::{Orchestrator, Scheduler, TickReport};
use crate::storage::{InMemoryStorage, PostgresStorage, SupplierStorage};
use onboard_types::{SupplierId, SupplierRecord};
use std::sync::Arc;

/// Onboarding daemon
pub struct Daemon {
    config: DaemonConfig,
    orchestrator: Arc<Orchestrator>,
}

impl Daemon {
    /// Connect storage and build collaborators from configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        config.validate().map_err(DaemonError::Config)?;
        let (storage, leases) = connect_backends(&config.storage).await?;
        let collaborators = Collaborators::from_config(&config)
            .map_err(|e| DaemonError::Config(e.to_string()))?;
        Ok(Self::with_parts(config, storage, leases, collaborators))
    }

    /// Assemble from already-built parts
    pub fn with_parts(
        config: DaemonConfig,
        storage: Arc<dyn SupplierStorage>,
        leases: Arc<dyn LeaseManager>,
        collaborators: Collaborators,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            storage,
            leases,
            collaborators,
            &config.scheduler,
            config.notifications.clone(),
        ));
        Self {
            config,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run ticks on the configured interval until Ctrl-C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        let (scheduler, tick_rx) =
            Scheduler::new(self.config.scheduler.clone(), self.orchestrator.clone());

        let runner = scheduler.clone();
        let handle = tokio::spawn(async move {
            runner.start(tick_rx).await;
        });

        // First tick right away instead of after one interval
        scheduler.trigger_tick().await;

        shutdown_signal().await;
        tracing::info!("Onboarding daemon shutting down");

        scheduler.stop().await;
        handle
            .await
            .map_err(|e| DaemonError::Scheduler(e.to_string()))?;
        Ok(())
    }

    /// Run exactly one tick
    pub async fn tick(&self) -> DaemonResult<TickReport> {
        self.orchestrator
            .run_tick(self.config.scheduler.batch_size)
            .await
    }

    pub async fn requeue(&self, id: SupplierId) -> DaemonResult<SupplierRecord> {
        self.orchestrator.requeue(id).await
    }
}

async fn connect_backends(
    config: &StorageConfig,
) -> DaemonResult<(Arc<dyn SupplierStorage>, Arc<dyn LeaseManager>)> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; records are lost on exit");
            Ok((
                Arc::new(InMemoryStorage::new()),
                Arc::new(InMemoryLeaseManager::new()),
            ))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage = PostgresStorage::new(url, *max_connections, *connect_timeout_secs).await?;
            let leases = PostgresLeaseManager::new(storage.pool().clone()).await?;
            tracing::info!("Connected to PostgreSQL storage");
            Ok((Arc::new(storage), Arc::new(leases)))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

//! Application context
//!
//! Built once at startup and handed to the API and persistence layers.

use std::sync::Arc;
use tracing::warn;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::error::Result;
use crate::persistence::SnapshotService;
use crate::store::StateStore;
use crate::supervisor::{ProcessLauncher, ProcessSupervisor, WorkerLauncher};

pub struct AppContext {
    pub config: AppConfig,
    pub store: StateStore,
    pub supervisor: ProcessSupervisor,
    pub snapshots: Option<SnapshotService>,
}

impl AppContext {
    /// Restore the last dump, then discover and spawn every worker
    pub async fn build(config: AppConfig) -> Result<Self> {
        let launcher = ProcessLauncher::new(config.supervisor.interpreter.clone());
        Self::with_launcher(config, Arc::new(launcher)).await
    }

    pub async fn with_launcher(config: AppConfig, launcher: Arc<dyn WorkerLauncher>) -> Result<Self> {
        let store = StateStore::new();

        let snapshots = config
            .persistence
            .enabled
            .then(|| SnapshotService::new(&config.persistence, store.clone()));
        if let Some(snapshots) = &snapshots {
            if let Err(e) = snapshots.restore().await {
                warn!(
                    "Ignoring unreadable dump {}: {}",
                    snapshots.dump_file().display(),
                    e
                );
            }
        }

        let supervisor =
            ProcessSupervisor::launch(config.supervisor.clone(), store.clone(), launcher).await?;

        Ok(Self {
            config,
            store,
            supervisor,
            snapshots,
        })
    }

    pub fn api_state(&self) -> AppState {
        AppState::new(self.supervisor.clone())
    }

    /// Stop every worker and write a final dump
    pub async fn shutdown(&self) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.stop();
        }
        self.supervisor.shutdown().await;
        if let Some(snapshots) = &self.snapshots {
            if let Err(e) = snapshots.dump_now().await {
                warn!("Final dump failed: {}", e);
            }
        }
    }
}

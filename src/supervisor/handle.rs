use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::channel::WorkerChannel;
use crate::registry::WorkerScript;

/// The supervisor's binding to one launched worker.
///
/// A handle is never revived: starting a stopped worker replaces its handle
/// with a new one carrying a higher `generation`.
#[derive(Clone)]
pub struct WorkerHandle {
    pub id: String,
    pub script_path: PathBuf,
    pub working_directory: PathBuf,
    pub running: bool,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub(crate) channel: Arc<dyn WorkerChannel>,
    /// Token of the scheduled start this handle is waiting on, if any
    pub(crate) restart_token: Option<u64>,
}

impl WorkerHandle {
    pub(crate) fn new(script: WorkerScript, generation: u64, channel: Arc<dyn WorkerChannel>) -> Self {
        Self {
            id: script.id,
            script_path: script.script_path,
            working_directory: script.working_directory,
            running: true,
            generation,
            created_at: Utc::now(),
            channel,
            restart_token: None,
        }
    }

    /// Script to relaunch when this handle is replaced
    pub fn script(&self) -> WorkerScript {
        WorkerScript {
            id: self.id.clone(),
            script_path: self.script_path.clone(),
            working_directory: self.working_directory.clone(),
        }
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            id: self.id.clone(),
            script_path: self.script_path.clone(),
            working_directory: self.working_directory.clone(),
            running: self.running,
            generation: self.generation,
            created_at: self.created_at,
            restart_pending: self.restart_token.is_some(),
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("script_path", &self.script_path)
            .field("running", &self.running)
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .field("restart_token", &self.restart_token)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a handle for the control API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub id: String,
    pub script_path: PathBuf,
    pub working_directory: PathBuf,
    pub running: bool,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub restart_pending: bool,
}

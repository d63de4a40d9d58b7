use chrono::{DateTime, Utc};

use crate::supervisor::ProcessSupervisor;
use crate::store::StateStore;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Supervisor owning the worker handles
    pub supervisor: ProcessSupervisor,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            supervisor,
            start_time: Utc::now(),
        }
    }

    pub fn store(&self) -> &StateStore {
        self.supervisor.store()
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}

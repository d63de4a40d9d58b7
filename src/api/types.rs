use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Control Types
// ============================================================================

/// Desired running state per exchange, e.g. `{"data": {"poloniex": true, "exmo": false}}`
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangeRequest {
    pub data: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartResponse {
    pub restarting: String,
    pub delay_ms: u64,
}

// ============================================================================
// System Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: i64,
    pub workers_total: usize,
    pub workers_running: usize,
    pub relay_subscribers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

use serde::Deserialize;

/// What happens to a worker that stops answering heartbeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark it stopped and wait for an explicit start or restart
    #[default]
    LeaveStopped,
    /// Mark it stopped, then start a fresh worker after the restart delay
    Restart,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::LeaveStopped => write!(f, "leave_stopped"),
            FailurePolicy::Restart => write!(f, "restart"),
        }
    }
}

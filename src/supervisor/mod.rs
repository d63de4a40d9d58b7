//! Worker process supervision
//!
//! This module provides the supervision layer:
//! - Process channel and launcher for worker scripts
//! - Handles with generation tokens, one per worker id
//! - Heartbeat monitor for ping/pong liveness
//! - Failure policy for workers that miss their heartbeat

pub mod channel;
pub mod handle;
pub mod heartbeat;
pub mod policy;
pub mod spawner;

pub use channel::{Launched, ProcessLauncher, WorkerChannel, WorkerLauncher};
pub use handle::{WorkerHandle, WorkerSummary};
pub use heartbeat::{HeartbeatMonitor, MonitorExit};
pub use policy::FailurePolicy;
pub use spawner::ProcessSupervisor;

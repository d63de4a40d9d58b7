pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod persistence;
pub mod registry;
pub mod router;
pub mod store;
pub mod supervisor;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{HerdError, Result};
pub use persistence::SnapshotService;
pub use registry::{WorkerRegistry, WorkerScript};
pub use router::{ControlMessage, MessageRouter, WorkerMessage};
pub use store::{Balance, ExchangeRecord, Order, StateStore, StatusSnapshot, StoreEvent};
pub use supervisor::{
    FailurePolicy, HeartbeatMonitor, ProcessLauncher, ProcessSupervisor, WorkerChannel,
    WorkerHandle, WorkerLauncher,
};

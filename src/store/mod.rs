//! In-memory exchange state store
//!
//! Authoritative record of each worker's last reported state:
//! - collection-level access (register, aggregate snapshot, dump/restore)
//! - record-level access (lookup and whole-field replacement)
//!
//! Mutations against an unknown exchange are logged and dropped; explicit
//! lookups report `ExchangeNotFound`.

mod collection;
mod exchange;
pub mod record;

pub use record::{
    Amount, Balance, ExchangeRecord, Markets, Order, RecordField, StatusReport, StatusSnapshot,
    Trade,
};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Change notification emitted after a mutation is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A blank record was created
    ExchangeAdded { exchange: String },
    /// A field group of an existing record was replaced
    FieldReplaced { exchange: String, field: RecordField },
    /// The running flag of a record was written
    RunningStateChanged { exchange: String, running: bool },
}

/// Shared handle to the exchange store
#[derive(Clone)]
pub struct StateStore {
    records: Arc<RwLock<HashMap<String, ExchangeRecord>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl StateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Subscribe to applied mutations
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

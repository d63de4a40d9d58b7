//! Inbound message routing
//!
//! Heartbeat replies go to the originating worker's monitor only. Domain
//! messages are relayed verbatim to live subscribers and applied to the
//! state store keyed by their `exchange` field.

pub mod message;

pub use message::{ControlMessage, WorkerMessage};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use crate::store::StateStore;

/// Delivers pong sequence numbers to one worker's heartbeat monitor
pub type PongSender = mpsc::UnboundedSender<u64>;

/// Routes worker messages into the store and the live relay
#[derive(Clone)]
pub struct MessageRouter {
    store: StateStore,
    publisher: broadcast::Sender<Value>,
}

impl MessageRouter {
    pub fn new(store: StateStore, capacity: usize) -> Self {
        let (publisher, _) = broadcast::channel(capacity.max(1));
        Self { store, publisher }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Subscribe to every relayed worker message. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.publisher.subscribe()
    }

    /// Live subscribers of the relay
    pub fn subscriber_count(&self) -> usize {
        self.publisher.receiver_count()
    }

    /// Route one inbound message from worker `origin`
    pub async fn route(&self, origin: &str, raw: Value, pongs: &PongSender) {
        let message = WorkerMessage::classify(&raw);

        match message {
            WorkerMessage::Pong { seq: Some(seq) } => {
                trace!("pong {} from {}", seq, origin);
                // Monitor already gone: the worker was retired
                let _ = pongs.send(seq);
                return;
            }
            WorkerMessage::Pong { seq: None } => {
                warn!("Dropping pong without a sequence number from {}", origin);
                return;
            }
            WorkerMessage::Shutdown => {
                debug!("Ignoring reserved control message from {}", origin);
                return;
            }
            _ => {}
        }

        // Lagging or absent subscribers are not our concern
        let _ = self.publisher.send(raw);

        match message {
            WorkerMessage::Status { exchange, report } => {
                self.store.update_exchange(&exchange, report).await;
            }
            WorkerMessage::Balance { exchange, balances } => {
                for balance in balances.iter().filter(|b| !b.has_decimal_amounts()) {
                    debug!(
                        "Balance {:?} from {} has non-decimal amounts, stored as sent",
                        balance.currency, exchange
                    );
                }
                self.store.update_balances(&exchange, balances).await;
            }
            WorkerMessage::ActiveOrders { exchange, orders } => {
                self.store.update_orders(&exchange, orders).await;
            }
            WorkerMessage::Trades { exchange, trades } => {
                self.store.update_trades(&exchange, trades).await;
            }
            WorkerMessage::Other { kind } => {
                debug!("Relayed {:?} message from {} without store update", kind, origin);
            }
            WorkerMessage::Pong { .. } | WorkerMessage::Shutdown => {}
        }
    }

    /// Drain a worker's inbound channel until the worker goes away
    pub async fn run(self, origin: String, mut inbound: mpsc::Receiver<Value>, pongs: PongSender) {
        while let Some(raw) = inbound.recv().await {
            self.route(&origin, raw, &pongs).await;
        }
        debug!("Inbound channel for {} closed", origin);
    }
}

//! Worker wire messages
//!
//! Workers speak newline-delimited JSON objects tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Balance, Order, StatusReport, Trade};

/// Inbound message from a worker, classified by its `type` tag
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Heartbeat reply; `seq` is None when `data` is not a sequence number
    Pong { seq: Option<u64> },
    /// Strategy and market selection
    Status { exchange: String, report: StatusReport },
    /// Full balance list
    Balance { exchange: String, balances: Vec<Balance> },
    /// Full list of open orders
    ActiveOrders { exchange: String, orders: Vec<Order> },
    /// Full list of recent trades
    Trades { exchange: String, trades: Vec<Trade> },
    /// Control type reserved for core-to-worker traffic
    Shutdown,
    /// Unrecognized tag, or a recognized tag with a malformed body
    Other { kind: Option<String> },
}

#[derive(Deserialize)]
struct Envelope<T> {
    exchange: String,
    data: T,
}

impl WorkerMessage {
    /// Classify a raw message. Never fails: anything not understood becomes
    /// `Other` so it can still be relayed.
    pub fn classify(raw: &Value) -> Self {
        let kind = raw.get("type").and_then(Value::as_str);
        let parsed = match kind {
            // Dispatched on the tag alone so no pong is ever mistaken for Other
            Some("pong") => {
                return WorkerMessage::Pong {
                    seq: raw.get("data").and_then(Value::as_u64),
                }
            }
            Some("status") => serde_json::from_value::<Envelope<StatusReport>>(raw.clone()).map(
                |env| WorkerMessage::Status {
                    exchange: env.exchange,
                    report: env.data,
                },
            ),
            Some("balance") => serde_json::from_value::<Envelope<Vec<Balance>>>(raw.clone()).map(
                |env| WorkerMessage::Balance {
                    exchange: env.exchange,
                    balances: env.data,
                },
            ),
            Some("active_orders") => serde_json::from_value::<Envelope<Vec<Order>>>(raw.clone())
                .map(|env| WorkerMessage::ActiveOrders {
                    exchange: env.exchange,
                    orders: env.data,
                }),
            Some("trades") => serde_json::from_value::<Envelope<Vec<Trade>>>(raw.clone()).map(
                |env| WorkerMessage::Trades {
                    exchange: env.exchange,
                    trades: env.data,
                },
            ),
            Some("shutdown") => Ok(WorkerMessage::Shutdown),
            other => {
                return WorkerMessage::Other {
                    kind: other.map(str::to_string),
                }
            }
        };

        parsed.unwrap_or_else(|e| {
            tracing::warn!("Malformed {:?} message from worker: {}", kind, e);
            WorkerMessage::Other {
                kind: kind.map(str::to_string),
            }
        })
    }
}

/// Outbound control message from the core to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Ping { data: u64 },
    Shutdown,
}

impl ControlMessage {
    pub fn to_value(&self) -> Value {
        match self {
            ControlMessage::Ping { data } => serde_json::json!({"type": "ping", "data": data}),
            ControlMessage::Shutdown => serde_json::json!({"type": "shutdown"}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_classify_balance() {
        let msg = WorkerMessage::classify(&json!({
            "type": "balance",
            "exchange": "hitbtc",
            "data": [{"currency": "BTC", "available": "0.05046", "reserved": "0"}]
        }));
        match msg {
            WorkerMessage::Balance { exchange, balances } => {
                assert_eq!(exchange, "hitbtc");
                assert_eq!(balances.len(), 1);
                assert_eq!(balances[0].available_decimal(), Some(dec!(0.05046)));
            }
            other => panic!("expected balance, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_pong() {
        let msg = WorkerMessage::classify(&json!({"type": "pong", "data": 7}));
        assert_eq!(msg, WorkerMessage::Pong { seq: Some(7) });
    }

    #[test]
    fn test_pong_with_bad_sequence_is_still_a_pong() {
        for raw in [
            json!({"type": "pong"}),
            json!({"type": "pong", "data": "3"}),
            json!({"type": "pong", "data": -1}),
            json!({"type": "pong", "data": 2.5}),
        ] {
            assert_eq!(WorkerMessage::classify(&raw), WorkerMessage::Pong { seq: None });
        }
    }

    #[test]
    fn test_classify_unknown_and_untagged() {
        assert_eq!(
            WorkerMessage::classify(&json!({"type": "error", "data": "boom"})),
            WorkerMessage::Other {
                kind: Some("error".to_string())
            }
        );
        assert_eq!(
            WorkerMessage::classify(&json!({"ETH_BTC": "off"})),
            WorkerMessage::Other { kind: None }
        );
    }

    #[test]
    fn test_malformed_body_is_other() {
        let msg = WorkerMessage::classify(&json!({
            "type": "status",
            "exchange": "hitbtc",
            "data": "not an object"
        }));
        assert_eq!(
            msg,
            WorkerMessage::Other {
                kind: Some("status".to_string())
            }
        );
    }

    #[test]
    fn test_control_messages_on_the_wire() {
        assert_eq!(
            ControlMessage::Ping { data: 1 }.to_value(),
            json!({"type": "ping", "data": 1})
        );
        assert_eq!(
            ControlMessage::Shutdown.to_value(),
            json!({"type": "shutdown"})
        );
        assert_eq!(
            serde_json::to_value(ControlMessage::Shutdown).unwrap(),
            ControlMessage::Shutdown.to_value()
        );
    }
}

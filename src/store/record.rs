//! Exchange record types mirrored from worker reports

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Per-market configuration as reported by the worker (shape is worker-defined)
pub type Markets = BTreeMap<String, serde_json::Value>;

/// A trade as reported by the worker
pub type Trade = serde_json::Value;

/// An amount exactly as the worker sent it: a JSON number, a decimal
/// string, or null
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub Value);

impl Amount {
    /// Decimal value, if the amount is a number or a decimal string
    pub fn to_decimal(&self) -> Option<Decimal> {
        match &self.0 {
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            _ => None,
        }
    }
}

// Keeps an explicit null distinct from an absent field
fn present<'de, D>(deserializer: D) -> Result<Option<Amount>, D::Error>
where
    D: Deserializer<'de>,
{
    Amount::deserialize(deserializer).map(Some)
}

/// Balance of one currency on an exchange. Stored and relayed verbatim;
/// amounts are only interpreted on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub available: Option<Amount>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub reserved: Option<Amount>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Balance {
    pub fn available_decimal(&self) -> Option<Decimal> {
        self.available.as_ref().and_then(Amount::to_decimal)
    }

    pub fn reserved_decimal(&self) -> Option<Decimal> {
        self.reserved.as_ref().and_then(Amount::to_decimal)
    }

    /// True when both amounts are present and parse as decimals
    pub fn has_decimal_amounts(&self) -> bool {
        self.available_decimal().is_some() && self.reserved_decimal().is_some()
    }
}

/// An open order on an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Exchange-assigned id (numeric on some venues, string on others)
    pub id: serde_json::Value,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Strategy and market selection reported by a `status` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub strategy: String,
    #[serde(default)]
    pub markets: Markets,
}

/// Last reported state of one exchange worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub markets: Markets,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub active_orders: Vec<Order>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

/// Aggregate snapshot of every exchange, tagged for direct relay to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: BTreeMap<String, ExchangeRecord>,
}

impl StatusSnapshot {
    pub const KIND: &'static str = "status-all";

    pub fn new(data: BTreeMap<String, ExchangeRecord>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            data,
        }
    }
}

/// Field group replaced by a store mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Status,
    Balances,
    ActiveOrders,
    Trades,
    Running,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordField::Status => write!(f, "status"),
            RecordField::Balances => write!(f, "balances"),
            RecordField::ActiveOrders => write!(f, "activeOrders"),
            RecordField::Trades => write!(f, "trades"),
            RecordField::Running => write!(f, "running"),
        }
    }
}

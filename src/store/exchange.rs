use tracing::warn;

use super::{Balance, ExchangeRecord, Order, RecordField, StateStore, StatusReport, StoreEvent, Trade};
use crate::error::{HerdError, Result};

impl StateStore {
    /// Copy of the record for `exchange`
    pub async fn find_exchange_by_id(&self, exchange: &str) -> Result<ExchangeRecord> {
        let records = self.records.read().await;
        records
            .get(exchange)
            .cloned()
            .ok_or_else(|| HerdError::ExchangeNotFound(exchange.to_string()))
    }

    /// Apply `mutate` to the record in place. Unknown ids are logged and the
    /// mutation is dropped.
    async fn mutate<F>(&self, exchange: &str, field: RecordField, mutate: F) -> bool
    where
        F: FnOnce(&mut ExchangeRecord),
    {
        let mut records = self.records.write().await;
        match records.get_mut(exchange) {
            Some(record) => {
                mutate(record);
                true
            }
            None => {
                warn!(
                    "Dropping {} update: {}",
                    field,
                    HerdError::ExchangeNotFound(exchange.to_string())
                );
                false
            }
        }
    }

    /// Replace strategy and markets; every other field is kept
    pub async fn update_exchange(&self, exchange: &str, status: StatusReport) -> bool {
        let applied = self
            .mutate(exchange, RecordField::Status, |record| {
                record.strategy = status.strategy;
                record.markets = status.markets;
            })
            .await;
        if applied {
            self.emit(StoreEvent::FieldReplaced {
                exchange: exchange.to_string(),
                field: RecordField::Status,
            });
        }
        applied
    }

    pub async fn update_balances(&self, exchange: &str, balances: Vec<Balance>) -> bool {
        let applied = self
            .mutate(exchange, RecordField::Balances, |record| {
                record.balances = balances;
            })
            .await;
        if applied {
            self.emit(StoreEvent::FieldReplaced {
                exchange: exchange.to_string(),
                field: RecordField::Balances,
            });
        }
        applied
    }

    pub async fn update_orders(&self, exchange: &str, orders: Vec<Order>) -> bool {
        let applied = self
            .mutate(exchange, RecordField::ActiveOrders, |record| {
                record.active_orders = orders;
            })
            .await;
        if applied {
            self.emit(StoreEvent::FieldReplaced {
                exchange: exchange.to_string(),
                field: RecordField::ActiveOrders,
            });
        }
        applied
    }

    pub async fn update_trades(&self, exchange: &str, trades: Vec<Trade>) -> bool {
        let applied = self
            .mutate(exchange, RecordField::Trades, |record| {
                record.trades = trades;
            })
            .await;
        if applied {
            self.emit(StoreEvent::FieldReplaced {
                exchange: exchange.to_string(),
                field: RecordField::Trades,
            });
        }
        applied
    }

    /// Record whether the worker script is running
    pub async fn update_running_state(&self, exchange: &str, running: bool) -> bool {
        let applied = self
            .mutate(exchange, RecordField::Running, |record| {
                record.running = running;
            })
            .await;
        if applied {
            self.emit(StoreEvent::RunningStateChanged {
                exchange: exchange.to_string(),
                running,
            });
        }
        applied
    }
}

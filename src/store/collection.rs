use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::{ExchangeRecord, StateStore, StatusSnapshot, StoreEvent};

impl StateStore {
    /// Ensure a blank record exists for `exchange`.
    ///
    /// Returns true when a record was created; an existing record is left
    /// untouched.
    pub async fn add_exchange(&self, exchange: &str) -> bool {
        let mut records = self.records.write().await;
        if records.contains_key(exchange) {
            debug!("Exchange {} already registered", exchange);
            return false;
        }
        records.insert(exchange.to_string(), ExchangeRecord::default());
        drop(records);

        info!("Registered exchange {}", exchange);
        self.emit(StoreEvent::ExchangeAdded {
            exchange: exchange.to_string(),
        });
        true
    }

    /// Point-in-time copy of every record, tagged `status-all`
    pub async fn get_status(&self) -> StatusSnapshot {
        let records = self.records.read().await;
        let data: BTreeMap<_, _> = records
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        StatusSnapshot::new(data)
    }

    /// Registered exchange ids, sorted
    pub async fn exchange_ids(&self) -> Vec<String> {
        let records = self.records.read().await;
        let mut ids: Vec<_> = records.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Records in a form suitable for writing to durable storage
    pub async fn dump(&self) -> BTreeMap<String, ExchangeRecord> {
        self.get_status().await.data
    }

    /// Load records from a previous dump. Existing ids are overwritten.
    pub async fn restore(&self, dumped: HashMap<String, ExchangeRecord>) -> usize {
        let count = dumped.len();
        let mut records = self.records.write().await;
        records.extend(dumped);
        count
    }
}

//! Snapshot Service
//!
//! Periodically writes the exchange store to a JSON dump file and restores
//! it on startup. Dumps are written:
//! - On a regular interval
//! - Right after a worker's running state changes
//! - On demand (e.g. before shutdown)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PersistenceConfig;
use crate::error::Result;
use crate::store::{ExchangeRecord, StateStore, StoreEvent};

/// Writes and restores store dumps
pub struct SnapshotService {
    dump_file: PathBuf,
    interval: Duration,
    store: StateStore,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SnapshotService {
    pub fn new(config: &PersistenceConfig, store: StateStore) -> Self {
        Self {
            dump_file: config.dump_file.clone(),
            interval: Duration::from_secs(config.dump_interval_secs.max(1)),
            store,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn dump_file(&self) -> &Path {
        &self.dump_file
    }

    /// Load the dump file into the store. A missing file is not an error.
    pub async fn restore(&self) -> Result<usize> {
        let contents = match tokio::fs::read_to_string(&self.dump_file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No dump file at {}, it will be created",
                    self.dump_file.display()
                );
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let records: HashMap<String, ExchangeRecord> = serde_json::from_str(&contents)?;
        let count = self.store.restore(records).await;
        info!(
            "Restored {} exchanges from {}",
            count,
            self.dump_file.display()
        );
        Ok(count)
    }

    /// Write the current store to the dump file
    pub async fn dump_now(&self) -> Result<()> {
        write_dump(&self.dump_file, &self.store).await
    }

    /// Start the periodic dump task
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Snapshot service started (interval: {}s, file: {})",
            self.interval.as_secs(),
            self.dump_file.display()
        );

        let dump_file = self.dump_file.clone();
        let store = self.store.clone();
        let running = self.running.clone();
        let wake = self.wake.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;
            let mut events = store.subscribe();

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = timer.tick() => {}
                    event = events.recv() => match event {
                        Ok(StoreEvent::RunningStateChanged { exchange, running: now }) => {
                            debug!("Dumping after {} running={}", exchange, now);
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Snapshot service skipped {} store events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = wake.notified() => continue,
                }

                if let Err(e) = write_dump(&dump_file, &store).await {
                    error!("Unable to write dump {}: {}", dump_file.display(), e);
                }
            }

            info!("Snapshot service stopped");
        })
    }

    /// Stop the periodic dump task
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

/// Write via a temporary file so a crash never leaves a truncated dump
async fn write_dump(path: &Path, store: &StateStore) -> Result<()> {
    let records = store.dump().await;
    let payload = serde_json::to_vec_pretty(&records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, payload).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        warn!("Rename of {} failed: {}", tmp.display(), e);
        return Err(e.into());
    }
    debug!("Dumped {} exchanges to {}", records.len(), path.display());
    Ok(())
}

//! Shared fixtures for the integration tests: an in-memory worker channel
//! and a launcher that hands them out instead of spawning processes.

#![allow(dead_code)]

use async_trait::async_trait;
use botherd::config::SupervisorConfig;
use botherd::registry::WorkerScript;
use botherd::store::StoreEvent;
use botherd::supervisor::{Launched, WorkerChannel, WorkerLauncher};
use botherd::{HerdError, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

/// How a mock worker answers pings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongMode {
    /// Never answers
    Silent,
    /// Answers every ping with the same sequence number
    Echo,
    /// Answers with the previous sequence number
    Stale,
}

pub struct MockChannel {
    id: String,
    sent: Mutex<Vec<Value>>,
    closed: AtomicBool,
    mode: Mutex<PongMode>,
    inbound: mpsc::Sender<Value>,
}

impl MockChannel {
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    pub fn pings(&self) -> Vec<u64> {
        self.sent_of_type("ping")
            .iter()
            .filter_map(|m| m["data"].as_u64())
            .collect()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn set_mode(&self, mode: PongMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Deliver a message as if the worker had written it to stdout
    pub async fn emit(&self, message: Value) {
        self.inbound
            .send(message)
            .await
            .expect("router stopped reading");
    }
}

impl WorkerChannel for MockChannel {
    fn send(&self, message: Value) -> Result<()> {
        if self.is_closed() {
            return Err(HerdError::ChannelClosed(self.id.clone()));
        }

        let reply = match (message["type"].as_str(), message["data"].as_u64()) {
            (Some("ping"), Some(seq)) => match *self.mode.lock().unwrap() {
                PongMode::Silent => None,
                PongMode::Echo => Some(seq),
                PongMode::Stale => Some(seq.saturating_sub(1)),
            },
            _ => None,
        };
        self.sent.lock().unwrap().push(message);

        if let Some(seq) = reply {
            let _ = self.inbound.try_send(json!({"type": "pong", "data": seq}));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Launcher recording every launch; each launch gets a fresh MockChannel
pub struct MockLauncher {
    mode: Mutex<PongMode>,
    fail: AtomicBool,
    launches: Mutex<Vec<(String, Arc<MockChannel>)>>,
}

impl MockLauncher {
    pub fn new(mode: PongMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            fail: AtomicBool::new(false),
            launches: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: PongMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn fail_launches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self, id: &str) -> usize {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .filter(|(launched, _)| launched == id)
            .count()
    }

    /// Channel of the most recent launch of `id`
    pub fn latest(&self, id: &str) -> Arc<MockChannel> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(launched, _)| launched == id)
            .map(|(_, channel)| channel.clone())
            .unwrap_or_else(|| panic!("{} was never launched", id))
    }
}

#[async_trait]
impl WorkerLauncher for MockLauncher {
    async fn launch(&self, script: &WorkerScript) -> Result<Launched> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HerdError::Spawn {
                id: script.id.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock launch failure"),
            });
        }

        let (inbound_tx, inbound) = mpsc::channel(64);
        let channel = Arc::new(MockChannel {
            id: script.id.clone(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            mode: Mutex::new(*self.mode.lock().unwrap()),
            inbound: inbound_tx,
        });
        self.launches
            .lock()
            .unwrap()
            .push((script.id.clone(), channel.clone()));

        Ok(Launched {
            channel,
            inbound,
        })
    }
}

/// Bot directory containing one empty script per id
pub fn bot_dir(ids: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for id in ids {
        std::fs::write(dir.path().join(format!("{}.py", id)), "").unwrap();
    }
    dir
}

pub fn supervisor_config(bot_dir: &Path) -> SupervisorConfig {
    SupervisorConfig {
        bot_dir: bot_dir.to_path_buf(),
        heartbeat_interval_ms: 2000,
        heartbeat_timeout_ms: 5000,
        restart_delay_ms: 2000,
        ..Default::default()
    }
}

/// Running-state writes seen so far for `exchange`
pub fn running_writes(events: &mut broadcast::Receiver<StoreEvent>, exchange: &str) -> Vec<bool> {
    let mut writes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let StoreEvent::RunningStateChanged {
            exchange: changed,
            running,
        } = event
        {
            if changed == exchange {
                writes.push(running);
            }
        }
    }
    writes
}

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

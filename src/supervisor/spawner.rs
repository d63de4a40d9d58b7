//! Process supervisor
//!
//! Owns one handle per worker id, launches workers, wires their inbound
//! messages into the router and starts one heartbeat monitor per handle.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::channel::WorkerLauncher;
use super::handle::{WorkerHandle, WorkerSummary};
use super::heartbeat::HeartbeatMonitor;
use super::policy::FailurePolicy;
use crate::config::SupervisorConfig;
use crate::error::{HerdError, Result};
use crate::registry::{WorkerRegistry, WorkerScript};
use crate::router::{ControlMessage, MessageRouter};
use crate::store::StateStore;

struct Inner {
    config: SupervisorConfig,
    launcher: Arc<dyn WorkerLauncher>,
    router: MessageRouter,
    children: RwLock<HashMap<String, WorkerHandle>>,
    /// Serializes stop/start/liveness transitions
    control: Mutex<()>,
    generations: AtomicU64,
    restart_tokens: AtomicU64,
}

/// Supervises the worker processes. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Supervisor with no workers yet
    pub fn new(config: SupervisorConfig, store: StateStore, launcher: Arc<dyn WorkerLauncher>) -> Self {
        let router = MessageRouter::new(store, config.publish_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                launcher,
                router,
                children: RwLock::new(HashMap::new()),
                control: Mutex::new(()),
                generations: AtomicU64::new(0),
                restart_tokens: AtomicU64::new(0),
            }),
        }
    }

    /// Discover every worker in the configured bot directory and spawn it.
    ///
    /// Discovery failure aborts before any worker is launched.
    pub async fn launch(
        config: SupervisorConfig,
        store: StateStore,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Result<Self> {
        let registry = WorkerRegistry::new(&config.bot_dir, &config.script_extension);
        let workers = registry.workers()?;

        let supervisor = Self::new(config, store, launcher);
        for script in workers {
            let _guard = supervisor.inner.control.lock().await;
            supervisor.spawn(script).await?;
        }

        info!(
            "Supervising {} workers from {}",
            supervisor.inner.children.read().await.len(),
            registry.directory().display()
        );
        Ok(supervisor)
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &StateStore {
        self.inner.router.store()
    }

    /// Subscribe to relayed worker messages. Heartbeat traffic never appears here.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.inner.router.subscribe()
    }

    /// Live subscribers of the relay
    pub fn subscriber_count(&self) -> usize {
        self.inner.router.subscriber_count()
    }

    /// Copy of every handle keyed by worker id
    pub async fn spawned_children(&self) -> HashMap<String, WorkerHandle> {
        self.inner.children.read().await.clone()
    }

    pub async fn child(&self, id: &str) -> Option<WorkerHandle> {
        self.inner.children.read().await.get(id).cloned()
    }

    /// Handle summaries sorted by id
    pub async fn summaries(&self) -> Vec<WorkerSummary> {
        let children = self.inner.children.read().await;
        let mut summaries: Vec<_> = children.values().map(WorkerHandle::summary).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Launch a worker and make it the current handle for its id.
    ///
    /// Callers hold the control lock.
    async fn spawn(&self, script: WorkerScript) -> Result<u64> {
        let launched = self.inner.launcher.launch(&script).await?;
        let id = script.id.clone();
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let channel = launched.channel.clone();

        self.inner.children.write().await.insert(
            id.clone(),
            WorkerHandle::new(script, generation, launched.channel),
        );

        let (monitor, pongs) = HeartbeatMonitor::new(
            id.clone(),
            generation,
            self.inner.config.heartbeat_interval(),
            self.inner.config.heartbeat_timeout(),
            channel,
        );
        tokio::spawn(
            self.inner
                .router
                .clone()
                .run(id.clone(), launched.inbound, pongs),
        );
        tokio::spawn(monitor.run(self.clone()));

        let store = self.store();
        store.add_exchange(&id).await;
        store.update_running_state(&id, true).await;

        info!("Spawned worker {} (gen {})", id, generation);
        Ok(generation)
    }

    /// Ask a running worker to shut down and mark it stopped.
    ///
    /// Returns false, with no side effects on the worker, when the id is
    /// unknown or already stopped. Any pending scheduled start is revoked.
    pub async fn stop_bot(&self, id: &str) -> bool {
        let _guard = self.inner.control.lock().await;
        self.stop_locked(id).await
    }

    /// Callers hold the control lock.
    async fn stop_locked(&self, id: &str) -> bool {
        {
            let mut children = self.inner.children.write().await;
            let Some(handle) = children.get_mut(id) else {
                debug!("stop_bot: unknown worker {}", id);
                return false;
            };
            handle.restart_token = None;
            if !handle.running {
                return false;
            }
            if let Err(e) = handle.channel.send(ControlMessage::Shutdown.to_value()) {
                warn!("Shutdown message to {} not delivered: {}", id, e);
            }
            handle.running = false;
        }

        self.store().update_running_state(id, false).await;
        info!("Stopped worker {}", id);
        true
    }

    /// Replace a stopped worker's handle with a freshly launched one.
    ///
    /// Returns Ok(false) when the id is unknown or already running. A launch
    /// failure keeps the stopped handle and is returned to the caller.
    pub async fn start_bot(&self, id: &str) -> Result<bool> {
        let _guard = self.inner.control.lock().await;
        let script = {
            let children = self.inner.children.read().await;
            match children.get(id) {
                Some(handle) if !handle.running => handle.script(),
                Some(_) => return Ok(false),
                None => {
                    debug!("start_bot: unknown worker {}", id);
                    return Ok(false);
                }
            }
        };

        self.spawn(script).await?;
        Ok(true)
    }

    /// Stop now, start again after the restart delay.
    ///
    /// The delayed start only fires if nothing else started or stopped the
    /// worker in the meantime. Returns false for an unknown id.
    pub async fn restart_bot(&self, id: &str) -> bool {
        let armed = {
            let _guard = self.inner.control.lock().await;
            self.stop_locked(id).await;
            self.arm_restart(id).await
        };
        match armed {
            Some((generation, token)) => {
                info!(
                    "Restarting worker {} in {:?}",
                    id,
                    self.inner.config.restart_delay()
                );
                self.schedule_start(id.to_string(), generation, token);
                true
            }
            None => false,
        }
    }

    /// Forward an arbitrary payload (e.g. market toggles) to a running worker
    pub async fn send_to_bot(&self, id: &str, payload: Value) -> Result<()> {
        let children = self.inner.children.read().await;
        let handle = children
            .get(id)
            .ok_or_else(|| HerdError::UnknownWorker(id.to_string()))?;
        if !handle.running {
            return Err(HerdError::WorkerNotRunning(id.to_string()));
        }
        handle.channel.send(payload)
    }

    /// Stop every running worker
    pub async fn shutdown(&self) -> usize {
        let ids: Vec<String> = {
            let children = self.inner.children.read().await;
            children
                .values()
                .filter(|h| h.running)
                .map(|h| h.id.clone())
                .collect()
        };

        let mut stopped = 0;
        for id in ids {
            if self.stop_bot(&id).await {
                stopped += 1;
            }
        }
        info!("Supervisor shut down {} workers", stopped);
        stopped
    }

    /// True while `generation` is the current, running handle for `id`
    pub(crate) async fn is_live(&self, id: &str, generation: u64) -> bool {
        let children = self.inner.children.read().await;
        children
            .get(id)
            .is_some_and(|h| h.generation == generation && h.running)
    }

    /// Liveness death: same as a stop, minus the shutdown message.
    ///
    /// Only the current running handle is affected; returns whether a
    /// transition happened.
    pub(crate) async fn mark_unresponsive(&self, id: &str, generation: u64) -> bool {
        let _guard = self.inner.control.lock().await;
        {
            let mut children = self.inner.children.write().await;
            match children.get_mut(id) {
                Some(handle) if handle.generation == generation && handle.running => {
                    handle.running = false;
                }
                _ => return false,
            }
        }

        self.store().update_running_state(id, false).await;
        warn!("Worker {} marked not running after heartbeat failure", id);

        match self.inner.config.failure_policy {
            FailurePolicy::LeaveStopped => {}
            FailurePolicy::Restart => {
                if let Some((generation, token)) = self.arm_restart(id).await {
                    info!(
                        "Failure policy: restarting {} in {:?}",
                        id,
                        self.inner.config.restart_delay()
                    );
                    self.schedule_start(id.to_string(), generation, token);
                }
            }
        }
        true
    }

    /// Stamp a stopped handle with a fresh restart token
    async fn arm_restart(&self, id: &str) -> Option<(u64, u64)> {
        let mut children = self.inner.children.write().await;
        let handle = children.get_mut(id)?;
        if handle.running {
            return None;
        }
        let token = self.inner.restart_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        handle.restart_token = Some(token);
        Some((handle.generation, token))
    }

    fn schedule_start(&self, id: String, generation: u64, token: u64) {
        let supervisor = self.clone();
        let delay = self.inner.config.restart_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.scheduled_start(id, generation, token).await;
        });
    }

    // Boxed: spawn -> heartbeat -> scheduled start -> spawn is recursive
    fn scheduled_start(self, id: String, generation: u64, token: u64) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let _guard = self.inner.control.lock().await;
            let script = {
                let children = self.inner.children.read().await;
                match children.get(&id) {
                    Some(handle)
                        if handle.generation == generation
                            && handle.restart_token == Some(token)
                            && !handle.running =>
                    {
                        handle.script()
                    }
                    _ => {
                        debug!("Scheduled start of {} superseded", id);
                        return;
                    }
                }
            };

            if let Err(e) = self.spawn(script).await {
                error!("Scheduled start of {} failed: {}", id, e);
            }
        })
    }
}

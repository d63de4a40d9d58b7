//! Bidirectional channel to a worker process
//!
//! Workers read JSON lines on stdin and write JSON lines on stdout.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{HerdError, Result};
use crate::registry::WorkerScript;

/// Outbound half of a worker connection
pub trait WorkerChannel: Send + Sync {
    /// Queue a message for the worker. Fails once the worker side is gone.
    fn send(&self, message: Value) -> Result<()>;

    /// True once nothing more can be delivered
    fn is_closed(&self) -> bool;
}

/// A freshly launched worker: its outbound channel and inbound message stream
pub struct Launched {
    pub channel: Arc<dyn WorkerChannel>,
    pub inbound: mpsc::Receiver<Value>,
}

/// Starts worker processes
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, script: &WorkerScript) -> Result<Launched>;
}

/// Channel backed by a child process's stdin
pub struct ProcessChannel {
    id: String,
    outbound: mpsc::UnboundedSender<String>,
}

impl WorkerChannel for ProcessChannel {
    fn send(&self, message: Value) -> Result<()> {
        let line = serde_json::to_string(&message)?;
        self.outbound
            .send(line)
            .map_err(|_| HerdError::ChannelClosed(self.id.clone()))
    }

    fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Launches each worker script as a child process
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    interpreter: Option<String>,
    inbound_capacity: usize,
}

impl ProcessLauncher {
    /// An empty interpreter runs scripts directly
    pub fn new(interpreter: impl Into<String>) -> Self {
        let interpreter = interpreter.into();
        Self {
            interpreter: (!interpreter.trim().is_empty()).then_some(interpreter),
            inbound_capacity: 256,
        }
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    fn command(&self, script_path: &Path) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(script_path);
                cmd
            }
            None => Command::new(script_path),
        }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, script: &WorkerScript) -> Result<Launched> {
        let id = script.id.clone();
        let script_path = tokio::fs::canonicalize(&script.script_path)
            .await
            .unwrap_or_else(|_| script.script_path.clone());

        let mut cmd = self.command(&script_path);
        cmd.current_dir(&script.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning worker {} ({})", id, script_path.display());
        let mut child = cmd.spawn().map_err(|source| HerdError::Spawn {
            id: id.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HerdError::Internal(format!("worker {} has no stdin", id)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HerdError::Internal(format!("worker {} has no stdout", id)))?;
        let stderr = child.stderr.take();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.inbound_capacity);
        let (exited_tx, exited_rx) = oneshot::channel();

        tokio::spawn(write_lines(id.clone(), stdin, outbound_rx, exited_rx));
        tokio::spawn(read_messages(id.clone(), stdout, inbound_tx));
        if let Some(stderr) = stderr {
            tokio::spawn(log_stderr(id.clone(), stderr));
        }

        let pid = child.id();
        let waiter_id = id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!("Worker {} exited", waiter_id),
                Ok(status) => warn!("Worker {} exited with {}", waiter_id, status),
                Err(e) => warn!("Failed to wait on worker {}: {}", waiter_id, e),
            }
            let _ = exited_tx.send(());
        });

        info!("Worker {} started (pid {:?})", id, pid);
        Ok(Launched {
            channel: Arc::new(ProcessChannel {
                id,
                outbound: outbound_tx,
            }),
            inbound: inbound_rx,
        })
    }
}

async fn write_lines(
    id: String,
    mut stdin: tokio::process::ChildStdin,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut exited: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            line = outbound.recv() => {
                let Some(mut line) = line else { break };
                line.push('\n');
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    warn!("Write to worker {} failed: {}", id, e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    warn!("Flush to worker {} failed: {}", id, e);
                    break;
                }
            }
            _ = &mut exited => break,
        }
    }
    // Dropping the receiver closes the channel for senders
    debug!("Outbound channel for {} closed", id);
}

async fn read_messages(
    id: String,
    stdout: tokio::process::ChildStdout,
    inbound: mpsc::Sender<Value>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(value) if value.is_object() => {
                        if inbound.send(value).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => warn!("Worker {} sent a non-object message: {}", id, line),
                    Err(e) => warn!("Worker {} sent invalid JSON ({}): {}", id, e, line),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Read from worker {} failed: {}", id, e);
                break;
            }
        }
    }
}

async fn log_stderr(id: String, stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(worker = %id, "stderr: {}", line);
    }
}

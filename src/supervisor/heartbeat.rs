//! Heartbeat monitor for one worker handle
//!
//! The monitor pings the worker with an increasing sequence number and
//! waits for a pong carrying that number or higher. Each beat runs to its
//! full deadline before the next interval starts, so pings go out every
//! `interval + timeout`. A send failure or a missed deadline retires the
//! handle; the monitor never resurrects it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::channel::WorkerChannel;
use super::spawner::ProcessSupervisor;
use crate::router::{ControlMessage, PongSender};

/// Why a monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Handle was stopped or replaced before a tick
    Retired,
    /// The ping could not be sent
    ChannelClosed,
    /// No pong arrived before the deadline
    Unresponsive,
}

/// The ping currently awaiting its pong
#[derive(Debug, Clone, Copy)]
struct Beat {
    expected: u64,
    deadline: Instant,
}

impl Beat {
    /// A pong satisfies the beat if it is at least as new as the ping
    fn satisfied_by(&self, seq: u64) -> bool {
        seq >= self.expected
    }
}

pub struct HeartbeatMonitor {
    id: String,
    generation: u64,
    interval: Duration,
    timeout: Duration,
    channel: Arc<dyn WorkerChannel>,
    pongs: mpsc::UnboundedReceiver<u64>,
    seq: u64,
}

impl HeartbeatMonitor {
    /// Monitor plus the sender the router uses to hand it pongs
    pub fn new(
        id: String,
        generation: u64,
        interval: Duration,
        timeout: Duration,
        channel: Arc<dyn WorkerChannel>,
    ) -> (Self, PongSender) {
        let (pong_tx, pongs) = mpsc::unbounded_channel();
        let monitor = Self {
            id,
            generation,
            interval,
            timeout,
            channel,
            pongs,
            seq: 0,
        };
        (monitor, pong_tx)
    }

    pub async fn run(mut self, supervisor: ProcessSupervisor) -> MonitorExit {
        debug!(
            "Heartbeat for {} (gen {}) every {:?}",
            self.id, self.generation, self.interval
        );

        let exit = loop {
            tokio::time::sleep(self.interval).await;
            self.seq += 1;

            if !supervisor.is_live(&self.id, self.generation).await {
                break MonitorExit::Retired;
            }

            // Replies to earlier pings can never satisfy this one
            while self.pongs.try_recv().is_ok() {}

            let ping = ControlMessage::Ping { data: self.seq }.to_value();
            if let Err(e) = self.channel.send(ping) {
                warn!("Heartbeat ping to {} failed: {}", self.id, e);
                supervisor
                    .mark_unresponsive(&self.id, self.generation)
                    .await;
                break MonitorExit::ChannelClosed;
            }

            let beat = Beat {
                expected: self.seq,
                deadline: Instant::now() + self.timeout,
            };
            if self.await_pong(beat).await {
                trace!("Heartbeat {} acknowledged by {}", beat.expected, self.id);
                tokio::time::sleep_until(beat.deadline).await;
                continue;
            }

            info!(
                "No pong from {} for heartbeat {} within {:?}, considering it dead",
                self.id, beat.expected, self.timeout
            );
            supervisor
                .mark_unresponsive(&self.id, self.generation)
                .await;
            break MonitorExit::Unresponsive;
        };

        debug!("Heartbeat for {} (gen {}) ended: {:?}", self.id, self.generation, exit);
        exit
    }

    /// Wait until the beat is satisfied or its deadline passes
    async fn await_pong(&mut self, beat: Beat) -> bool {
        let pongs = &mut self.pongs;
        let id = &self.id;
        let wait = async {
            loop {
                match pongs.recv().await {
                    Some(seq) if beat.satisfied_by(seq) => return,
                    Some(seq) => trace!("Stale pong {} from {} (want {})", seq, id, beat.expected),
                    // Router gone; only the deadline can end this beat
                    None => std::future::pending::<()>().await,
                }
            }
        };
        tokio::time::timeout_at(beat.deadline, wait).await.is_ok()
    }
}

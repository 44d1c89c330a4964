//! Heartbeat timer and zombie detection

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::protocol::GatewayMessage;

/// Ack bookkeeping of the current connection
#[derive(Debug, Clone)]
pub struct HeartbeatState {
    last_sent: Option<Instant>,
    acked: bool,
    latency: Option<Duration>,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self {
            last_sent: None,
            acked: true,
            latency: None,
        }
    }

    /// Record an outgoing beat; `false` if the previous one was never acked
    pub(crate) fn record_sent(&mut self) -> bool {
        if !self.acked {
            return false;
        }
        self.acked = false;
        self.last_sent = Some(Instant::now());
        true
    }

    pub(crate) fn ack_received(&mut self) {
        self.acked = true;
        if let Some(sent) = self.last_sent {
            self.latency = Some(sent.elapsed());
        }
    }

    /// Round trip of the last acknowledged beat
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Beat on `interval` until the connection goes away or turns zombie
///
/// The first beat waits a random fraction of the interval so that many
/// shards reconnecting at once do not beat in lockstep.
pub(crate) async fn run_heartbeat(
    interval: Duration,
    sequence: Arc<Mutex<Option<u64>>>,
    state: Arc<Mutex<HeartbeatState>>,
    outbound: mpsc::Sender<GatewayMessage>,
    zombie: oneshot::Sender<()>,
) {
    let jitter = rand::random::<f64>();
    tokio::time::sleep(interval.mul_f64(jitter)).await;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !state.lock().record_sent() {
            tracing::warn!(interval = ?interval, "Heartbeat not acknowledged, connection is a zombie");
            let _ = zombie.send(());
            return;
        }
        let seq = *sequence.lock();
        if outbound.send(GatewayMessage::heartbeat(seq)).await.is_err() {
            return;
        }
        tracing::trace!(seq = ?seq, "Heartbeat sent");
    }
}

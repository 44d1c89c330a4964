//! Session state and the reconnect gate

use parking_lot::Mutex;
use tokio::sync::watch;

/// Lifecycle of one shard's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    /// READY received; still waiting for the listed servers
    Ready,
    Connected,
    Reconnecting,
}

impl SessionState {
    /// States in which a live connection may be torn down for a reconnect
    fn is_live(self) -> bool {
        matches!(
            self,
            Self::AwaitingHello | Self::Identifying | Self::Resuming | Self::Ready | Self::Connected
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Published on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session_id: Option<String>,
    /// Servers listed in READY that have not arrived yet
    pub pending_servers: usize,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            pending_servers: 0,
        }
    }
}

/// Mutex-guarded state shared by the engine and its handle
///
/// Every trigger for a reconnect (zombie heartbeat, close frame, op 7,
/// op 9, a user request) goes through [`StateGate::begin_reconnect`];
/// only the first one while the connection is live wins.
pub(crate) struct StateGate {
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
}

impl StateGate {
    pub(crate) fn new() -> (Self, watch::Receiver<SessionStatus>) {
        let (status, receiver) = watch::channel(SessionStatus::default());
        let gate = Self {
            state: Mutex::new(SessionState::Disconnected),
            status,
        };
        (gate, receiver)
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.state.lock()
    }

    pub(crate) fn set(&self, next: SessionState) {
        let mut state = self.state.lock();
        let from = *state;
        if from != next {
            tracing::debug!(from = %from, to = %next, "Session state");
            *state = next;
            self.status.send_modify(|s| s.state = next);
        }
    }

    /// Move to `to` only if the state is still `from`
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        tracing::debug!(from = %from, to = %to, "Session state");
        *state = to;
        self.status.send_modify(|s| s.state = to);
        true
    }

    /// Claim the single reconnect slot; `false` if one is already underway
    pub(crate) fn begin_reconnect(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_live() {
            return false;
        }
        *state = SessionState::Reconnecting;
        self.status.send_modify(|s| s.state = SessionState::Reconnecting);
        true
    }

    pub(crate) fn set_session_id(&self, session_id: Option<String>) {
        self.status.send_modify(|s| s.session_id = session_id);
    }

    pub(crate) fn set_pending(&self, pending: usize) {
        self.status.send_if_modified(|s| {
            let changed = s.pending_servers != pending;
            s.pending_servers = pending;
            changed
        });
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_gate_admits_one_trigger() {
        let (gate, rx) = StateGate::new();
        assert!(!gate.begin_reconnect());

        gate.set(SessionState::Connected);
        assert!(gate.begin_reconnect());
        assert!(!gate.begin_reconnect());
        assert_eq!(gate.get(), SessionState::Reconnecting);
        assert_eq!(rx.borrow().state, SessionState::Reconnecting);

        gate.set(SessionState::Connecting);
        assert!(!gate.begin_reconnect());
        gate.set(SessionState::Identifying);
        assert!(gate.begin_reconnect());
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let (gate, _rx) = StateGate::new();
        gate.set(SessionState::Ready);
        assert!(gate.begin_reconnect());
        assert!(!gate.transition(SessionState::Ready, SessionState::Connected));
        assert_eq!(gate.get(), SessionState::Reconnecting);
    }

    #[test]
    fn test_status_publishes_transitions() {
        let (gate, mut rx) = StateGate::new();
        gate.set(SessionState::Ready);
        gate.set_session_id(Some("abc".into()));
        gate.set_pending(3);
        assert!(rx.has_changed().unwrap());
        let status = rx.borrow_and_update().clone();
        assert_eq!(status.state, SessionState::Ready);
        assert_eq!(status.session_id.as_deref(), Some("abc"));
        assert_eq!(status.pending_servers, 3);

        gate.set_pending(3);
        assert!(!rx.has_changed().unwrap());
    }
}

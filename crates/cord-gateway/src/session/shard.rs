//! Shard session engine and its handle

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cord_common::ClientConfig;
use cord_core::payloads::UnavailableGuildPayload;
use cord_core::{Activity, Event, Intents, Snowflake, UserStatus};
use cord_rest::RestClient;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::Instrument;

use super::apply::{run_applier, Applied, Job};
use super::backoff::Backoff;
use super::connection::{self, WsStream};
use super::heartbeat::{run_heartbeat, HeartbeatState};
use super::state::{SessionState, SessionStatus, StateGate};
use super::task::AbortOnDrop;
use crate::dispatch::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{HandlerContext, HandlerRegistry, ShardInfo};
use crate::protocol::{
    decode, decode_binary, describe_close_code, CloseAction, CloseCode, GatewayMessage,
    HelloPayload, IdentifyPayload, IdentifyProperties, Packet, PresenceUpdatePayload,
    ResumePayload,
};

const OUTBOUND_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 16;
const WRITER_DRAIN: Duration = Duration::from_secs(2);
/// How long queued packets may still apply once the session stops
const APPLY_DRAIN: Duration = Duration::from_secs(2);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Close code sent when the session should stay resumable
const RESUMABLE_CLOSE: u16 = 4000;
const NORMAL_CLOSE: u16 = 1000;
/// No status code in the close frame
const NO_STATUS: u16 = 1005;

/// Per-shard session settings
#[derive(Clone)]
pub struct ShardConfig {
    /// Raw token sent in Identify and Resume
    pub token: String,
    pub shard: ShardInfo,
    /// Base websocket url, without query
    pub gateway_url: String,
    pub intents: Intents,
    pub large_threshold: u32,
    /// Presence announced in Identify
    pub presence: Option<PresenceUpdatePayload>,
    /// HTTP proxy used to tunnel the websocket
    pub proxy: Option<String>,
    /// Failed resumes in a row before falling back to Identify
    pub max_resume_attempts: u32,
    /// Failed connection cycles in a row before giving up
    pub max_reconnect_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub hello_timeout: Duration,
    /// How long READY's unavailable servers are waited for
    pub initial_servers_timeout: Duration,
}

impl ShardConfig {
    pub fn new(token: impl Into<String>, shard: ShardInfo, gateway_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shard,
            gateway_url: gateway_url.into(),
            intents: Intents::non_privileged(),
            large_threshold: 250,
            presence: None,
            proxy: None,
            max_resume_attempts: 3,
            max_reconnect_attempts: 10,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            hello_timeout: Duration::from_secs(30),
            initial_servers_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_client_config(config: &ClientConfig, shard: ShardInfo, gateway_url: impl Into<String>) -> Self {
        Self {
            intents: config.intents,
            large_threshold: config.large_threshold,
            proxy: config.proxy.clone(),
            max_resume_attempts: config.max_resume_attempts,
            max_reconnect_attempts: config.max_reconnect_attempts,
            backoff_base: config.backoff_base,
            backoff_max: config.backoff_max,
            ..Self::new(config.token.clone(), shard, gateway_url)
        }
    }
}

impl std::fmt::Debug for ShardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardConfig")
            .field("token", &"<redacted>")
            .field("shard", &self.shard)
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .field("proxy", &self.proxy)
            .field("max_resume_attempts", &self.max_resume_attempts)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .finish_non_exhaustive()
    }
}

/// Builder for a shard's session task
pub struct Shard {
    config: ShardConfig,
    dispatcher: Arc<Dispatcher>,
    handlers: Arc<HandlerRegistry>,
    rest: Option<Arc<RestClient>>,
}

impl Shard {
    pub fn new(config: ShardConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            handlers: Arc::new(HandlerRegistry::with_defaults()),
            rest: None,
        }
    }

    /// Enable member and channel backfills
    pub fn with_rest(mut self, rest: Arc<RestClient>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<HandlerRegistry>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Start the session task
    pub fn spawn(self) -> ShardHandle {
        let span = tracing::info_span!("shard", shard = %self.config.shard);
        let (engine, mut handle) = self.build(&span);
        handle.task = AbortOnDrop::spawn(engine.run().instrument(span));
        handle
    }

    /// The engine and a handle to it, without a running session task
    fn build(self, span: &tracing::Span) -> (Engine, ShardHandle) {
        let shard = self.config.shard;
        let (gate, status) = StateGate::new();
        let gate = Arc::new(gate);
        let heartbeat = Arc::new(Mutex::new(HeartbeatState::new()));
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut ctx = HandlerContext::new(Arc::clone(self.dispatcher.cache()), shard);
        if let Some(rest) = self.rest {
            ctx = ctx.with_rest(rest);
        }

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (applied_tx, applied_rx) = mpsc::unbounded_channel();
        let applier = AbortOnDrop::spawn(
            run_applier(jobs_rx, self.handlers, self.dispatcher, applied_tx).instrument(span.clone()),
        );

        let engine = Engine {
            config: self.config,
            ctx,
            jobs: jobs_tx,
            applied: applied_rx,
            applier,
            generation: 0,
            gate: Arc::clone(&gate),
            heartbeat: Arc::clone(&heartbeat),
            commands: commands_rx,
            shutdown: shutdown_rx,
            session: None,
            sequence: None,
            ready_servers: Vec::new(),
            pending: HashSet::new(),
            pending_deadline: None,
            established: false,
        };
        let handle = ShardHandle {
            shard,
            gate,
            status,
            heartbeat,
            commands: commands_tx,
            shutdown: shutdown_tx,
            task: AbortOnDrop::empty(),
        };
        (engine, handle)
    }
}

enum Command {
    Send(GatewayMessage),
    Reconnect,
}

/// Control of a running shard
///
/// Dropping the handle aborts the session task together with its
/// heartbeat and writer, which closes the transport.
pub struct ShardHandle {
    shard: ShardInfo,
    gate: Arc<StateGate>,
    status: watch::Receiver<SessionStatus>,
    heartbeat: Arc<Mutex<HeartbeatState>>,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: AbortOnDrop<GatewayResult<()>>,
}

impl ShardHandle {
    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    pub fn state(&self) -> SessionState {
        self.gate.get()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Lifecycle updates of this shard
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.gate.subscribe()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.heartbeat.lock().latency()
    }

    /// Whether the session task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Queue a frame; it goes out once a connection is live
    pub async fn send(&self, message: GatewayMessage) -> GatewayResult<()> {
        self.commands
            .send(Command::Send(message))
            .await
            .map_err(|_| GatewayError::Shutdown)
    }

    /// Set the account's status and activity (op 3)
    pub async fn update_presence(&self, status: UserStatus, activity: Option<Activity>) -> GatewayResult<()> {
        let message = GatewayMessage::presence_update(&PresenceUpdatePayload::new(status, activity))?;
        self.send(message).await
    }

    /// Drop the connection and resume on a new one
    ///
    /// Returns `false` if the session is not live or a reconnect is
    /// already underway.
    pub async fn reconnect(&self) -> bool {
        if !self.gate.begin_reconnect() {
            return false;
        }
        self.commands.send(Command::Reconnect).await.is_ok()
    }

    /// Resolve once the shard is connected and its servers have arrived
    ///
    /// Fails with the session's error if it stops first.
    pub async fn wait_until_connected(&mut self) -> GatewayResult<()> {
        self.wait_for(|state| state == SessionState::Connected).await
    }

    /// Resolve once READY (or RESUMED) was received
    pub async fn wait_until_ready(&mut self) -> GatewayResult<()> {
        self.wait_for(|state| matches!(state, SessionState::Ready | SessionState::Connected))
            .await
    }

    async fn wait_for(&mut self, reached: impl Fn(SessionState) -> bool) -> GatewayResult<()> {
        loop {
            if reached(self.status.borrow_and_update().state) {
                return Ok(());
            }
            tokio::select! {
                changed = self.status.changed() => {
                    if changed.is_err() {
                        return Err(GatewayError::Shutdown);
                    }
                }
                outcome = self.task.join() => {
                    return Err(match outcome {
                        Some(Ok(Err(e))) => e,
                        _ => GatewayError::Shutdown,
                    });
                }
            }
        }
    }

    /// Wait for the session task to end on its own
    pub async fn closed(&mut self) -> GatewayResult<()> {
        match self.task.join().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => {
                tracing::error!(shard = %self.shard, error = %e, "Session task failed");
                Err(GatewayError::Shutdown)
            }
            None => Ok(()),
        }
    }

    /// Close the connection and stop the session
    pub async fn shutdown(mut self) -> GatewayResult<()> {
        let _ = self.shutdown.send(true);
        if let Ok(result) = tokio::time::timeout(SHUTDOWN_GRACE, self.closed()).await {
            result
        } else {
            tracing::warn!(shard = %self.shard, "Session did not stop in time, aborting");
            Ok(())
        }
    }
}

impl std::fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardHandle")
            .field("shard", &self.shard)
            .field("state", &self.gate.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Resume,
    Reidentify,
    Shutdown,
}

#[derive(Debug)]
struct Disconnect {
    next: Next,
    cause: String,
}

impl Disconnect {
    fn new(next: Next, cause: impl Into<String>) -> Self {
        Self {
            next,
            cause: cause.into(),
        }
    }

    fn shutdown() -> Self {
        Self::new(Next::Shutdown, "shutdown requested")
    }
}

/// The parts of READY the engine needs for itself
#[derive(Deserialize)]
struct ReadyInfo {
    session_id: String,
    #[serde(default)]
    resume_gateway_url: Option<String>,
    #[serde(default)]
    guilds: Vec<UnavailableGuildPayload>,
}

struct ResumeInfo {
    session_id: String,
    url: Option<String>,
}

/// Outcome of one wait in the event loop
enum Step {
    Shutdown,
    Zombie(bool),
    Command(Option<Command>),
    Applied(Option<Applied>),
    ServersTimedOut,
    Frame(Option<Result<Message, tungstenite::Error>>),
}

struct Engine {
    config: ShardConfig,
    ctx: HandlerContext,
    /// Ordered queue into the applier task
    jobs: mpsc::UnboundedSender<Job>,
    applied: mpsc::UnboundedReceiver<Applied>,
    applier: AbortOnDrop<()>,
    /// Counts connections, so late packet notices can be told apart
    generation: u64,
    gate: Arc<StateGate>,
    heartbeat: Arc<Mutex<HeartbeatState>>,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    session: Option<ResumeInfo>,
    sequence: Option<u64>,
    /// Servers listed in the READY that is being applied
    ready_servers: Vec<Snowflake>,
    /// READY's unavailable servers still to arrive
    pending: HashSet<Snowflake>,
    pending_deadline: Option<Instant>,
    /// READY or RESUMED seen on the current connection
    established: bool,
}

impl Engine {
    async fn run(mut self) -> GatewayResult<()> {
        let index = self.config.shard.index;
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);
        let mut failures = 0u32;
        let mut resume_failures = 0u32;

        let result = loop {
            let resuming = self.can_resume();
            self.established = false;
            let outcome = self.connect_and_run(resuming).await;
            let was_established = self.established;
            if was_established {
                backoff.reset();
                failures = 0;
                resume_failures = 0;
            }

            let disconnect = match outcome {
                Ok(disconnect) => disconnect,
                Err(GatewayError::Shutdown) => break Ok(()),
                Err(e) if e.is_fatal() => break Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Connection failed");
                    Disconnect::new(Next::Resume, e.to_string())
                }
            };

            match disconnect.next {
                Next::Shutdown => break Ok(()),
                Next::Reidentify => self.forget_session(),
                Next::Resume => {}
            }

            if was_established {
                self.lifecycle(Event::LostConnection { shard: index });
            } else {
                failures += 1;
                if resuming {
                    resume_failures += 1;
                }
                if failures > self.config.max_reconnect_attempts {
                    break Err(GatewayError::ReconnectsExhausted(failures));
                }
            }
            if self.can_resume() && resume_failures >= self.config.max_resume_attempts {
                tracing::info!(attempts = resume_failures, "Resume keeps failing, identifying instead");
                self.forget_session();
                resume_failures = 0;
            }

            self.gate.set(SessionState::Reconnecting);
            let delay = backoff.next_delay();
            tracing::info!(
                cause = %disconnect.cause,
                delay = ?delay,
                attempt = failures,
                resume = self.can_resume(),
                "Reconnecting"
            );
            self.lifecycle(Event::Reconnect {
                shard: index,
                cause: disconnect.cause,
            });
            if self.sleep_or_shutdown(delay).await {
                break Ok(());
            }
        };

        self.gate.set(SessionState::Disconnected);
        match &result {
            Ok(()) => tracing::info!("Session closed"),
            Err(e) => tracing::error!(error = %e, "Session stopped"),
        }

        let Self { jobs, mut applier, .. } = self;
        drop(jobs);
        if tokio::time::timeout(APPLY_DRAIN, applier.join()).await.is_err() {
            tracing::warn!("Queued packets did not apply in time, dropping them");
        }
        result
    }

    fn lifecycle(&self, event: Event) {
        if self.jobs.send(Job::Lifecycle(event)).is_err() {
            tracing::error!("Packet applier stopped, lifecycle event dropped");
        }
    }

    fn can_resume(&self) -> bool {
        self.session.is_some() && self.sequence.is_some()
    }

    fn forget_session(&mut self) {
        self.session = None;
        self.sequence = None;
        self.gate.set_session_id(None);
    }

    /// Returns `true` if shutdown was requested during the sleep
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.changed() => true,
            () = tokio::time::sleep(delay) => false,
        }
    }

    async fn connect_and_run(&mut self, resuming: bool) -> GatewayResult<Disconnect> {
        self.generation += 1;
        self.gate.set(SessionState::Connecting);
        let base = match &self.session {
            Some(ResumeInfo { url: Some(url), .. }) if resuming => url.clone(),
            _ => self.config.gateway_url.clone(),
        };
        let url = connection::endpoint(&base);
        tracing::info!(url = %url, resume = resuming, "Connecting to gateway");

        let stream = connection::connect(&url, self.config.proxy.as_deref()).await?;
        let (sink, mut reader) = stream.split();

        self.gate.set(SessionState::AwaitingHello);
        let hello = wait_for_hello(&mut reader, self.config.hello_timeout).await?;
        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!(interval = ?interval, "Hello received");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (zombie_tx, zombie_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();

        let greeting = self.greeting(resuming)?;
        outbound_tx
            .send(greeting)
            .await
            .map_err(|_| GatewayError::Shutdown)?;

        let sequence = Arc::new(Mutex::new(self.sequence));
        *self.heartbeat.lock() = HeartbeatState::new();
        let heartbeat = AbortOnDrop::spawn(run_heartbeat(
            interval,
            Arc::clone(&sequence),
            Arc::clone(&self.heartbeat),
            outbound_tx.clone(),
            zombie_tx,
        ));
        let mut writer = AbortOnDrop::spawn(write_loop(sink, outbound_rx, close_rx));

        let ctx = self.ctx.clone().with_gateway(outbound_tx.clone());
        let result = self
            .event_loop(&mut reader, &outbound_tx, &sequence, zombie_rx, &ctx)
            .await;

        let code = match &result {
            Ok(Disconnect { next: Next::Resume, .. }) => RESUMABLE_CLOSE,
            _ => NORMAL_CLOSE,
        };
        let _ = close_tx.send(code);
        drop(heartbeat);
        drop(ctx);
        drop(outbound_tx);
        if tokio::time::timeout(WRITER_DRAIN, writer.join()).await.is_err() {
            tracing::debug!("Writer did not drain in time");
        }
        result
    }

    fn greeting(&self, resuming: bool) -> GatewayResult<GatewayMessage> {
        if resuming {
            if let (Some(session), Some(seq)) = (&self.session, self.sequence) {
                self.gate.set(SessionState::Resuming);
                tracing::info!(session_id = %session.session_id, seq = seq, "Resuming session");
                return Ok(GatewayMessage::resume(&ResumePayload {
                    token: self.config.token.clone(),
                    session_id: session.session_id.clone(),
                    seq,
                })?);
            }
        }

        self.gate.set(SessionState::Identifying);
        tracing::info!(intents = ?self.config.intents, "Identifying");
        let shard = self.config.shard;
        Ok(GatewayMessage::identify(&IdentifyPayload {
            token: self.config.token.clone(),
            properties: IdentifyProperties::default(),
            shard: [shard.index, shard.count],
            intents: self.config.intents,
            large_threshold: self.config.large_threshold,
            presence: self.config.presence.clone(),
        })?)
    }

    async fn event_loop(
        &mut self,
        reader: &mut SplitStream<WsStream>,
        outbound: &mpsc::Sender<GatewayMessage>,
        sequence: &Mutex<Option<u64>>,
        mut zombie: oneshot::Receiver<()>,
        ctx: &HandlerContext,
    ) -> GatewayResult<Disconnect> {
        let mut zombie_done = false;
        let mut applier_open = true;
        loop {
            let deadline = self.pending_deadline;
            let step = tokio::select! {
                biased;
                _ = self.shutdown.changed() => Step::Shutdown,
                fired = &mut zombie, if !zombie_done => Step::Zombie(fired.is_ok()),
                command = self.commands.recv() => Step::Command(command),
                applied = self.applied.recv(), if applier_open => Step::Applied(applied),
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Step::ServersTimedOut
                }
                frame = reader.next() => Step::Frame(frame),
            };

            match step {
                Step::Shutdown => return Ok(Disconnect::shutdown()),
                Step::Zombie(fired) => {
                    zombie_done = true;
                    if fired {
                        if let Some(d) = self.claim(Next::Resume, "heartbeat not acknowledged") {
                            return Ok(d);
                        }
                    }
                }
                Step::Command(Some(Command::Send(message))) => {
                    if outbound.send(message).await.is_err() {
                        self.gate.begin_reconnect();
                        return Ok(Disconnect::new(Next::Resume, "writer stopped"));
                    }
                }
                Step::Command(Some(Command::Reconnect)) => {
                    if self.gate.get() == SessionState::Reconnecting {
                        return Ok(Disconnect::new(Next::Resume, "reconnect requested"));
                    }
                }
                Step::Command(None) => {}
                Step::Applied(Some(applied)) => self.on_applied(&applied),
                Step::Applied(None) => {
                    applier_open = false;
                    tracing::error!("Packet applier stopped");
                }
                Step::ServersTimedOut => self.servers_timed_out(),
                Step::Frame(None) => {
                    self.gate.begin_reconnect();
                    return Ok(Disconnect::new(Next::Resume, "connection closed without close frame"));
                }
                Step::Frame(Some(Err(e))) => {
                    self.gate.begin_reconnect();
                    return Ok(Disconnect::new(Next::Resume, format!("read error: {e}")));
                }
                Step::Frame(Some(Ok(message))) => {
                    if let Some(d) = self.handle_message(message, outbound, sequence, ctx).await? {
                        return Ok(d);
                    }
                }
            }
        }
    }

    /// Take the reconnect slot for `next`; `None` if another trigger owns it
    fn claim(&self, next: Next, cause: &str) -> Option<Disconnect> {
        if self.gate.begin_reconnect() {
            Some(Disconnect::new(next, cause))
        } else {
            tracing::debug!(cause = cause, "Reconnect already underway");
            None
        }
    }

    async fn handle_message(
        &mut self,
        message: Message,
        outbound: &mpsc::Sender<GatewayMessage>,
        sequence: &Mutex<Option<u64>>,
        ctx: &HandlerContext,
    ) -> GatewayResult<Option<Disconnect>> {
        let decoded = match &message {
            Message::Text(text) => decode(text),
            Message::Binary(bytes) => decode_binary(bytes),
            Message::Close(frame) => return self.closed(frame.as_ref()).map(Some),
            _ => return Ok(None),
        };
        match decoded {
            Ok(Some(packet)) => self.handle_packet(packet, outbound, sequence, ctx).await,
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                Ok(None)
            }
        }
    }

    fn closed(&self, frame: Option<&CloseFrame<'_>>) -> GatewayResult<Disconnect> {
        let code = frame.map_or(NO_STATUS, |f| u16::from(f.code));
        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
        tracing::warn!(code = code, reason = %reason, "Gateway closed the connection");
        self.gate.begin_reconnect();

        match CloseCode::classify(code) {
            CloseAction::Fatal => Err(fatal_close(code)),
            CloseAction::Reidentify => Ok(Disconnect::new(Next::Reidentify, describe_close_code(code))),
            CloseAction::Resume => Ok(Disconnect::new(Next::Resume, describe_close_code(code))),
        }
    }

    async fn handle_packet(
        &mut self,
        packet: Packet,
        outbound: &mpsc::Sender<GatewayMessage>,
        sequence: &Mutex<Option<u64>>,
        ctx: &HandlerContext,
    ) -> GatewayResult<Option<Disconnect>> {
        match packet {
            Packet::Dispatch { seq, event, payload } => {
                self.queue_dispatch(seq, event, payload, sequence, ctx);
                Ok(None)
            }
            Packet::Heartbeat => {
                let seq = *sequence.lock();
                tracing::trace!(seq = ?seq, "Heartbeat requested by gateway");
                let _ = outbound.send(GatewayMessage::heartbeat(seq)).await;
                Ok(None)
            }
            Packet::HeartbeatAck => {
                self.heartbeat.lock().ack_received();
                Ok(None)
            }
            Packet::Reconnect => {
                tracing::info!("Gateway requested a reconnect");
                Ok(self.claim(Next::Resume, "gateway requested reconnect"))
            }
            Packet::InvalidSession { resumable } => {
                let state = self.gate.get();
                tracing::warn!(resumable = resumable, state = %state, "Session invalidated");
                if !resumable && state == SessionState::Identifying && !self.established {
                    return Err(GatewayError::HandshakeRejected);
                }
                let next = if resumable { Next::Resume } else { Next::Reidentify };
                Ok(self.claim(next, "invalid session"))
            }
            Packet::Hello(_) => {
                tracing::debug!("Ignoring repeated Hello");
                Ok(None)
            }
            packet @ (Packet::Identify(_)
            | Packet::Resume(_)
            | Packet::PresenceUpdate(_)
            | Packet::RequestGuildMembers(_)) => {
                tracing::debug!(op = %packet.opcode(), "Ignoring client opcode from gateway");
                Ok(None)
            }
        }
    }

    /// Queue one dispatch for the applier, then advance the sequence
    ///
    /// READY and RESUMED mark the connection established right away; the
    /// state moves on once their cache changes are applied.
    fn queue_dispatch(
        &mut self,
        seq: Option<u64>,
        event: String,
        payload: Value,
        sequence: &Mutex<Option<u64>>,
        ctx: &HandlerContext,
    ) {
        if event == "READY" {
            match ReadyInfo::deserialize(&payload) {
                Ok(info) => self.ready_received(info),
                Err(e) => tracing::warn!(error = %e, "READY without session data"),
            }
        } else if event == "RESUMED" {
            self.established = true;
            tracing::info!(seq = ?self.sequence, "Session resumed");
        }

        let job = Job::Dispatch {
            generation: self.generation,
            seq,
            event,
            payload,
            ctx: ctx.clone(),
        };
        if self.jobs.send(job).is_err() {
            tracing::error!(seq = ?seq, "Packet applier stopped, packet dropped");
        }

        if let Some(seq) = seq {
            *sequence.lock() = Some(seq);
            self.sequence = Some(seq);
        }
    }

    fn ready_received(&mut self, info: ReadyInfo) {
        self.established = true;
        self.gate.set_session_id(Some(info.session_id.clone()));
        self.session = Some(ResumeInfo {
            session_id: info.session_id,
            url: info.resume_gateway_url,
        });
        self.ready_servers = info.guilds.iter().map(|g| g.id).collect();
    }

    fn on_applied(&mut self, applied: &Applied) {
        let current = applied.generation == self.generation;
        match applied.event.as_str() {
            "READY" if current => self.on_ready(),
            "RESUMED" if current => self.on_resumed(),
            _ => {}
        }
        self.check_pending();
    }

    fn on_ready(&mut self) {
        let cache = Arc::clone(self.ctx.cache_arc());
        let pending: HashSet<Snowflake> = std::mem::take(&mut self.ready_servers)
            .into_iter()
            .filter(|id| cache.is_unavailable(*id))
            .collect();
        let next = if pending.is_empty() {
            SessionState::Connected
        } else {
            SessionState::Ready
        };
        if !self.gate.transition(SessionState::Identifying, next) {
            tracing::debug!(state = %self.gate.get(), "READY applied after the session moved on");
            return;
        }

        self.pending = pending;
        self.gate.set_pending(self.pending.len());
        if self.pending.is_empty() {
            self.pending_deadline = None;
        } else {
            tracing::info!(pending = self.pending.len(), "Waiting for servers");
            self.pending_deadline = Some(Instant::now() + self.config.initial_servers_timeout);
        }
    }

    fn on_resumed(&mut self) {
        let next = if self.pending.is_empty() {
            SessionState::Connected
        } else {
            SessionState::Ready
        };
        self.gate.transition(SessionState::Resuming, next);
    }

    /// Drop servers that arrived (or were removed) from the pending set
    fn check_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let cache = Arc::clone(self.ctx.cache_arc());
        self.pending.retain(|id| cache.is_unavailable(*id));
        self.gate.set_pending(self.pending.len());
        if self.pending.is_empty() {
            tracing::info!("All servers available");
            self.pending_deadline = None;
            self.gate.transition(SessionState::Ready, SessionState::Connected);
        }
    }

    fn servers_timed_out(&mut self) {
        tracing::warn!(missing = self.pending.len(), "Timed out waiting for servers");
        self.pending.clear();
        self.pending_deadline = None;
        self.gate.set_pending(0);
        self.gate.transition(SessionState::Ready, SessionState::Connected);
    }
}

fn fatal_close(code: u16) -> GatewayError {
    if code == CloseCode::AuthenticationFailed.as_u16() {
        GatewayError::AuthenticationFailed
    } else {
        GatewayError::FatalClose {
            code,
            reason: describe_close_code(code),
        }
    }
}

async fn wait_for_hello(reader: &mut SplitStream<WsStream>, limit: Duration) -> GatewayResult<HelloPayload> {
    let read = async {
        while let Some(frame) = reader.next().await {
            let decoded = match frame? {
                Message::Text(text) => decode(&text),
                Message::Binary(bytes) => decode_binary(&bytes),
                Message::Close(frame) => {
                    let code = frame.as_ref().map_or(NO_STATUS, |f| u16::from(f.code));
                    if CloseCode::classify(code) == CloseAction::Fatal {
                        return Err(fatal_close(code));
                    }
                    break;
                }
                _ => continue,
            };
            match decoded {
                Ok(Some(Packet::Hello(hello))) => return Ok(hello),
                Ok(Some(other)) => tracing::debug!(op = ?other.opcode(), "Frame before Hello ignored"),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Undecodable frame before Hello"),
            }
        }
        Err(GatewayError::Transport(tungstenite::Error::ConnectionClosed))
    };
    tokio::time::timeout(limit, read)
        .await
        .map_err(|_| GatewayError::HandshakeTimeout(limit))?
}

/// Drain the outbound queue into the socket until told to close
///
/// Queued packets may still hold a sender of this connection, so the close
/// signal ends the loop rather than the queue running dry.
async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<GatewayMessage>,
    mut close: oneshot::Receiver<u16>,
) {
    let code = loop {
        tokio::select! {
            biased;
            code = &mut close => break code.ok(),
            message = outbound.recv() => match message {
                Some(message) => {
                    if !send_frame(&mut sink, &message).await {
                        return;
                    }
                }
                None => break (&mut close).await.ok(),
            },
        }
    };
    while let Ok(message) = outbound.try_recv() {
        if !send_frame(&mut sink, &message).await {
            return;
        }
    }

    let frame = code.map(|code| CloseFrame {
        code: WsCloseCode::from(code),
        reason: "".into(),
    });
    let _ = sink.send(Message::Close(frame)).await;
    let _ = sink.close().await;
}

/// `false` once the socket is gone
async fn send_frame(sink: &mut SplitSink<WsStream, Message>, message: &GatewayMessage) -> bool {
    let json = match message.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(op = message.op, error = %e, "Failed to encode frame");
            return true;
        }
    };
    tracing::trace!(op = message.op, "Sending frame");
    if let Err(e) = sink.send(Message::Text(json.into())).await {
        tracing::debug!(error = %e, "Writer stopped");
        return false;
    }
    true
}

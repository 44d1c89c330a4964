//! Mock platform for integration tests
//!
//! One axum server answers the REST api under `/api` and upgrades `/` to
//! a websocket gateway. Each accepted gateway connection is handed to the
//! test as a [`MockConnection`] the test drives frame by frame.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use cord_cache::EntityCache;
use cord_client::ClientBuilder;
use cord_core::Event;
use cord_gateway::protocol::GatewayMessage;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TOKEN: &str = "test-token";
const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway opcodes the tests look at
pub mod op {
    pub const DISPATCH: u64 = 0;
    pub const HEARTBEAT: u64 = 1;
    pub const IDENTIFY: u64 = 2;
    pub const PRESENCE_UPDATE: u64 = 3;
    pub const RESUME: u64 = 6;
    pub const REQUEST_MEMBERS: u64 = 8;
}

/// Install a test subscriber once; `RUST_LOG` selects the output
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Canned REST response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn empty() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.body {
            Some(body) => (status, headers, axum::Json(body)).into_response(),
            None => (status, headers).into_response(),
        }
    }
}

/// A REST call the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path below `/api`, e.g. `/channels/20/messages`
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
    pub at: Instant,
}

#[derive(Default)]
struct RestState {
    responses: HashMap<(Method, String), VecDeque<MockResponse>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone)]
struct AppState {
    gateway_url: String,
    rest: Arc<Mutex<RestState>>,
    connections: mpsc::UnboundedSender<MockConnection>,
}

/// Mock platform lifecycle
pub struct MockPlatform {
    pub addr: SocketAddr,
    rest: Arc<Mutex<RestState>>,
    connections: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockConnection>>,
    _handle: JoinHandle<()>,
}

impl MockPlatform {
    pub async fn start() -> Result<Self> {
        init_logging();
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let rest = Arc::new(Mutex::new(RestState::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState {
            gateway_url: format!("ws://{addr}"),
            rest: Arc::clone(&rest),
            connections: tx,
        };
        let app = Router::new()
            .route("/", get(upgrade))
            .fallback(rest_handler)
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            rest,
            connections: tokio::sync::Mutex::new(rx),
            _handle: handle,
        })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn gateway_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client builder pointed at this mock with fast reconnects
    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new(TOKEN)
            .api_base_url(self.api_url())
            .backoff(Duration::from_millis(10), Duration::from_millis(100))
    }

    /// Queue a response for `method path`; unqueued calls get a 404
    pub fn respond(&self, method: Method, path: &str, response: MockResponse) {
        let mut rest = self.rest.lock().unwrap();
        rest.responses
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.rest.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method && r.path == path)
            .collect()
    }

    /// Next gateway connection the client opens
    pub async fn next_connection(&self) -> Result<MockConnection> {
        let mut connections = self.connections.lock().await;
        tokio::time::timeout(RECV_TIMEOUT, connections.recv())
            .await
            .context("no gateway connection")?
            .ok_or_else(|| anyhow!("mock server stopped"))
    }

    /// A connection opened already, without waiting
    pub fn next_connection_now(&self) -> Option<MockConnection> {
        self.connections.try_lock().ok()?.try_recv().ok()
    }

    /// Accept a connection and answer the identify with READY
    ///
    /// Returns the connection and the next sequence number to use.
    pub async fn accept_and_ready(&self, servers: &[u64]) -> Result<(MockConnection, u64)> {
        let mut conn = self.next_connection().await?;
        conn.hello(45_000)?;
        let identify = conn.recv_op(op::IDENTIFY).await?;
        if identify["d"]["token"] != TOKEN {
            return Err(anyhow!("unexpected identify: {identify}"));
        }
        conn.dispatch("READY", 1, crate::fixtures::ready(servers, &self.gateway_url()))?;
        Ok((conn, 2))
    }
}

/// Server side of one gateway connection
pub struct MockConnection {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl MockConnection {
    pub fn send(&self, message: &GatewayMessage) -> Result<()> {
        let text = message.to_json()?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| anyhow!("connection closed"))
    }

    pub fn hello(&self, interval_ms: u64) -> Result<()> {
        self.send(&GatewayMessage::hello(interval_ms))
    }

    pub fn dispatch(&self, event: &str, sequence: u64, data: Value) -> Result<()> {
        self.send(&GatewayMessage::dispatch(event, sequence, data))
    }

    /// Close the websocket with a close code
    pub fn close(&self, code: u16) -> Result<()> {
        self.outbound
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: "".into(),
            })))
            .map_err(|_| anyhow!("connection closed"))
    }

    /// Next frame from the client, `None` once it disconnected
    pub async fn recv(&mut self) -> Result<Option<Value>> {
        tokio::time::timeout(RECV_TIMEOUT, self.inbound.recv())
            .await
            .context("no frame from client")
    }

    /// Next frame with `op`, skipping heartbeats and anything else
    pub async fn recv_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self
                .recv()
                .await?
                .ok_or_else(|| anyhow!("client disconnected waiting for op {op}"))?;
            if frame["op"] == op {
                return Ok(frame);
            }
        }
    }

    /// Wait until the client closes the connection; the close code it sent
    pub async fn closed(&mut self) -> Result<Option<u16>> {
        let mut code = None;
        while let Some(frame) = self.recv().await? {
            if let Some(close) = frame.get("close") {
                code = close.as_u64().and_then(|c| u16::try_from(c).ok());
            }
        }
        Ok(code)
    }
}

async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| pump(socket, state.connections))
}

async fn pump(socket: WebSocket, connections: mpsc::UnboundedSender<MockConnection>) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    if connections
        .send(MockConnection {
            outbound: out_tx,
            inbound: in_rx,
        })
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    let _ = in_tx.send(value);
                }
            }
            Message::Close(frame) => {
                let code = frame.map(|f| f.code);
                let _ = in_tx.send(json!({"close": code}));
                break;
            }
            _ => {}
        }
    }
    writer.abort();
}

async fn rest_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path) = uri.path().strip_prefix("/api") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path = path.to_string();

    let queued = {
        let mut rest = state.rest.lock().unwrap();
        rest.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: uri.query().map(str::to_string),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: serde_json::from_slice(&body).ok(),
            at: Instant::now(),
        });
        rest.responses
            .get_mut(&(method.clone(), path.clone()))
            .and_then(VecDeque::pop_front)
    };

    let response = queued.unwrap_or_else(|| match (method, path.as_str()) {
        (Method::GET, "/gateway") => MockResponse::json(200, json!({"url": state.gateway_url})),
        (Method::GET, "/gateway/bot") => {
            MockResponse::json(200, json!({"url": state.gateway_url, "shards": 1}))
        }
        _ => MockResponse::json(404, json!({"message": "Unknown", "code": 10000})),
    });
    response.into_response()
}

/// Listener that forwards events to a test
pub fn event_stream() -> (impl Fn(&Event, &EntityCache) + Send + Sync + 'static, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = move |event: &Event, _: &EntityCache| {
        let _ = tx.send(event.clone());
    };
    (listener, EventStream { rx })
}

pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Next event matching `predicate`, skipping the others
    pub async fn next_matching(&mut self, predicate: impl Fn(&Event) -> bool) -> Result<Event> {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while let Some(event) = self.rx.recv().await {
                if predicate(&event) {
                    return Ok(event);
                }
            }
            Err(anyhow!("event stream closed"))
        })
        .await
        .context("no matching event")?
    }

    /// Everything received so far
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

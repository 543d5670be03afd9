//! TCP Auth Client
//!
//! Implements AuthBackend over one persistent, auto-reconnecting TCP
//! connection speaking newline-delimited JSON.
//!
//! A supervisor task owns the socket. Callers never touch it: each RPC gets
//! a correlation id, registers a one-shot waiter in the pending table and
//! hands its encoded line to the supervisor. Inbound responses are routed
//! back by id, so concurrent RPCs never compete for the same inbound line.

use crate::domain::ports::{AuthBackend, AuthBackendError};
use crate::domain::protocol::{
    decode_frame, encode_request, AuthReply, InboundFrame, RequestKind, ResponseBody,
    SubscriptionReply,
};
use crate::infrastructure::reconnect::{
    ConnectionState, ReconnectConfig, ReconnectMachine, RetryDecision,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;

/// Outbound lines buffered between callers and the socket writer.
const OUTBOUND_QUEUE: usize = 256;

/// Read half handed out by a [`Connector`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half handed out by a [`Connector`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens the byte stream to the auth backend.
///
/// Production uses [`TcpConnector`]; tests inject in-memory streams.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> std::io::Result<(BoxedReader, BoxedWriter)>;
}

/// Plain TCP connector.
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> std::io::Result<(BoxedReader, BoxedWriter)> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }
}

/// Auth client configuration.
#[derive(Debug, Clone)]
pub struct TcpAuthConfig {
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Per-attempt connect timeout
    pub connect_timeout: Duration,
    /// Per-RPC response timeout
    pub response_timeout: Duration,
    /// Close the socket after this long without traffic (disabled when None)
    pub idle_timeout: Option<Duration>,
    /// Reconnect backoff and budget
    pub reconnect: ReconnectConfig,
}

impl Default for TcpAuthConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3001,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            idle_timeout: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl TcpAuthConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Snapshot reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: String,
    pub connected: bool,
    pub host: String,
    pub port: u16,
    pub reconnect_attempts: u32,
    pub pending_requests: usize,
}

type Waiter = oneshot::Sender<Result<ResponseBody, AuthBackendError>>;

/// Why a session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Closed,
    Idle,
    Failed(String),
}

/// State shared between callers and the supervisor task.
struct Shared {
    config: TcpAuthConfig,
    connector: Arc<dyn Connector>,
    machine: Mutex<ReconnectMachine>,
    /// Pending exchanges ordered by correlation id (oldest first).
    /// `None` marks a request that was written but abandoned by its caller;
    /// it keeps its place so a late id-less reply is consumed by it.
    pending: Mutex<BTreeMap<u64, Option<Waiter>>>,
    /// Present only while a session is running
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    next_id: AtomicU64,
    /// External reconnect trigger
    wake: Notify,
    shutdown_tx: watch::Sender<bool>,
}

/// Detaches a caller from its pending entry on timeout or drop.
///
/// An unsent request is removed outright. A sent one becomes a tombstone
/// until the reply it is owed arrives or the session ends.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
    sent: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.shared.pending.lock();
        if !self.sent {
            pending.remove(&self.id);
        } else if let Some(slot) = pending.get_mut(&self.id) {
            *slot = None;
        }
    }
}

/// Resolves once shutdown has been requested (or the controller is gone).
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn idle_elapsed(idle_timeout: Option<Duration>) {
    match idle_timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

impl Shared {
    fn fail_all_pending(&self, error: AuthBackendError) {
        let drained = std::mem::take(&mut *self.pending.lock());
        let live = drained.values().filter(|slot| slot.is_some()).count();
        if live > 0 {
            tracing::warn!("failing {} pending auth backend request(s): {}", live, error);
        }
        for waiter in drained.into_values().flatten() {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// Route one inbound line.
    fn dispatch(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match decode_frame(line) {
            InboundFrame::Welcome => {
                tracing::debug!("received welcome message from auth backend");
            }
            InboundFrame::Notice(kind) => {
                tracing::debug!("received unsolicited '{}' message from auth backend", kind);
            }
            InboundFrame::Response { id, body } => {
                let slot = {
                    let mut pending = self.pending.lock();
                    match id {
                        Some(id) => {
                            // Ids are echoed in order: older tombstones are owed nothing
                            pending.retain(|k, slot| *k >= id || slot.is_some());
                            pending.remove(&id)
                        }
                        // Backends that do not echo ids answer in request order
                        None => pending.pop_first().map(|(_, slot)| slot),
                    }
                };
                match slot {
                    Some(Some(waiter)) => {
                        let _ = waiter.send(Ok(body));
                    }
                    Some(None) => tracing::debug!(
                        "discarding late auth backend response for an abandoned request"
                    ),
                    None => tracing::warn!(
                        "dropping auth backend response with no pending request (id={:?})",
                        id
                    ),
                }
            }
            InboundFrame::Malformed(e) => {
                tracing::error!("failed to parse auth backend response: {}", e);
                // The unreadable line still answers the oldest request, abandoned or not
                if let Some((_, Some(waiter))) = self.pending.lock().pop_first() {
                    let _ = waiter.send(Err(AuthBackendError::InvalidResponse));
                }
            }
        }
    }

    /// Pump one connected socket until it closes, idles out or shutdown.
    async fn run_session(
        &self,
        reader: BoxedReader,
        mut writer: BoxedWriter,
        mut outbound: mpsc::Receiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => {
                    let _ = writer.shutdown().await;
                    return SessionEnd::Shutdown;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.dispatch(&line),
                    Ok(None) => return SessionEnd::Closed,
                    Err(e) => return SessionEnd::Failed(e.to_string()),
                },
                msg = outbound.recv() => match msg {
                    Some(line) => {
                        let written = async {
                            writer.write_all(line.as_bytes()).await?;
                            writer.flush().await
                        }
                        .await;
                        if let Err(e) = written {
                            return SessionEnd::Failed(e.to_string());
                        }
                    }
                    None => return SessionEnd::Closed,
                },
                _ = idle_elapsed(self.config.idle_timeout) => {
                    tracing::warn!("auth backend connection idle, closing");
                    let _ = writer.shutdown().await;
                    return SessionEnd::Idle;
                }
            }
        }
    }

    /// Supervisor loop: connect, run the session, back off, repeat.
    async fn supervise(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let addr = self.config.addr();
        let max_attempts = self.config.reconnect.max_attempts;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.machine.lock().begin_connect() {
                // Budget exhausted: wait for reconnect() or shutdown
                tokio::select! {
                    _ = self.wake.notified() => continue,
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }

            tracing::info!("attempting to connect to auth backend at {}", addr);

            let connected = tokio::select! {
                result = tokio::time::timeout(self.config.connect_timeout, self.connector.connect()) => result,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match connected {
                Ok(Ok((reader, writer))) => {
                    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                    *self.outbound.lock() = Some(tx);
                    self.machine.lock().on_connected();
                    tracing::info!("connected to auth backend at {}", addr);

                    let end = self.run_session(reader, writer, rx, &mut shutdown).await;
                    *self.outbound.lock() = None;

                    match end {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed => tracing::warn!("connection to auth backend closed"),
                        SessionEnd::Idle => tracing::warn!("auth backend connection closed after idle timeout"),
                        SessionEnd::Failed(e) => tracing::error!("auth backend connection error: {}", e),
                    }
                }
                Ok(Err(e)) => tracing::error!("failed to connect to auth backend at {}: {}", addr, e),
                Err(_) => tracing::error!(
                    "connection to auth backend at {} timed out after {:?}",
                    addr,
                    self.config.connect_timeout
                ),
            }

            let decision = self.machine.lock().on_disconnected();
            self.fail_all_pending(AuthBackendError::ConnectionClosed);

            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::info!(
                        "scheduling reconnection attempt {}/{} in {}ms",
                        attempt,
                        max_attempts,
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.wake.notified() => {}
                        _ = shutdown_requested(&mut shutdown) => break,
                    }
                }
                RetryDecision::GiveUp => {
                    tracing::error!(
                        "failed to reconnect to auth backend after {} attempts",
                        max_attempts
                    );
                }
            }
        }

        *self.outbound.lock() = None;
        self.machine.lock().on_shutdown();
        self.fail_all_pending(AuthBackendError::ConnectionClosed);
    }
}

/// Persistent auth backend client.
pub struct TcpAuthClient {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl TcpAuthClient {
    /// Create a client that connects over TCP to `config.host:config.port`.
    pub fn new(config: TcpAuthConfig) -> Self {
        let connector = Arc::new(TcpConnector::new(config.addr()));
        Self::with_connector(config, connector)
    }

    /// Create a client with a custom transport.
    pub fn with_connector(config: TcpAuthConfig, connector: Arc<dyn Connector>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let machine = ReconnectMachine::new(config.reconnect.clone());
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                machine: Mutex::new(machine),
                pending: Mutex::new(BTreeMap::new()),
                outbound: Mutex::new(None),
                next_id: AtomicU64::new(1),
                wake: Notify::new(),
                shutdown_tx,
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Spawn the supervisor task. Idempotent.
    pub fn start(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            return;
        }
        let shared = self.shared.clone();
        *supervisor = Some(tokio::spawn(shared.supervise()));
    }

    /// Restart connecting after the retry budget ran out.
    ///
    /// Returns false when the client is connected or already connecting.
    pub fn reconnect(&self) -> bool {
        let reset = self.shared.machine.lock().reset();
        if reset {
            tracing::info!("manual reconnect to auth backend requested");
            self.shared.wake.notify_one();
        }
        reset
    }

    /// Stop the supervisor: cancel any pending backoff, close the socket
    /// and fail in-flight requests.
    pub async fn shutdown(&self) {
        self.shared.shutdown_tx.send_replace(true);
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.shared.outbound.lock() = None;
        self.shared.machine.lock().on_shutdown();
        self.shared.fail_all_pending(AuthBackendError::ConnectionClosed);
        tracing::info!("disconnected from auth backend");
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.machine.lock().state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.machine.lock().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        let (state, attempts) = {
            let machine = self.shared.machine.lock();
            (machine.state(), machine.attempts())
        };
        ConnectionStatus {
            state: state.to_string(),
            connected: state == ConnectionState::Connected,
            host: self.shared.config.host.clone(),
            port: self.shared.config.port,
            reconnect_attempts: attempts,
            pending_requests: self
                .shared
                .pending
                .lock()
                .values()
                .filter(|slot| slot.is_some())
                .count(),
        }
    }

    /// One request/response exchange.
    async fn call(&self, kind: RequestKind, token: &str) -> Result<ResponseBody, AuthBackendError> {
        let shared = &*self.shared;

        if !shared.machine.lock().is_connected() {
            return Err(AuthBackendError::NotConnected);
        }
        let sender = shared
            .outbound
            .lock()
            .clone()
            .ok_or(AuthBackendError::NotConnected)?;

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_request(id, kind, token)
            .map_err(|e| AuthBackendError::Encode(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        shared.pending.lock().insert(id, Some(tx));
        let mut guard = PendingGuard { shared, id, sent: false };

        // The deadline covers waiting for queue space as well as the reply
        let exchange = async {
            if sender.send(line).await.is_err() {
                return Err(AuthBackendError::NotConnected);
            }
            guard.sent = true;
            rx.await.unwrap_or(Err(AuthBackendError::ConnectionClosed))
        };

        match tokio::time::timeout(shared.config.response_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "auth backend '{}' request {} timed out after {:?}",
                    kind.as_str(),
                    id,
                    shared.config.response_timeout
                );
                Err(AuthBackendError::Timeout)
            }
        }
    }
}

impl Drop for TcpAuthClient {
    fn drop(&mut self) {
        self.shared.shutdown_tx.send_replace(true);
    }
}

#[async_trait]
impl AuthBackend for TcpAuthClient {
    async fn verify_authentication(&self, token: &str) -> Result<AuthReply, AuthBackendError> {
        tracing::debug!("verifying authentication token via auth backend");

        let body = self
            .call(RequestKind::Authenticated, token)
            .await
            .inspect_err(|e| tracing::error!("auth backend authentication request failed: {}", e))?;

        let reply = body.into_auth_reply();
        match &reply {
            AuthReply::Authenticated { user_id } => {
                tracing::debug!("authentication successful for user: {}", user_id)
            }
            AuthReply::Rejected { reason } => tracing::debug!("authentication failed: {}", reason),
        }
        Ok(reply)
    }

    async fn check_subscription(
        &self,
        token: &str,
    ) -> Result<SubscriptionReply, AuthBackendError> {
        tracing::debug!("checking subscription status via auth backend");

        let body = self
            .call(RequestKind::Subscriber, token)
            .await
            .inspect_err(|e| tracing::error!("auth backend subscription check failed: {}", e))?;

        let reply = body.into_subscription_reply();
        match &reply {
            SubscriptionReply::Checked { is_subscriber } => tracing::debug!(
                "subscription check successful: {}",
                if *is_subscriber { "subscriber" } else { "not subscriber" }
            ),
            SubscriptionReply::Rejected { reason } => {
                tracing::debug!("subscription check failed: {}", reason)
            }
        }
        Ok(reply)
    }
}

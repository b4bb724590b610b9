//! Connection manager for the event stream.
//!
//! Owns one logical connection and everything around it: the connect
//! timeout, reconnection with backoff, and the state/message/error channels
//! other components subscribe to.
//!
//! Each socket attempt gets a new generation number. The driver task and
//! every timer carry the generation they were started for, and every
//! callback checks it against the current one under the state lock before
//! doing anything, so work belonging to a superseded attempt is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sw_core::config::AppConfig;
use sw_core::constants::stream;
use sw_core::error::{SwError, SwResult};

use crate::backoff::BackoffPolicy;
use crate::state::{ConnectionState, ReadyState};
use crate::timer::{ScheduledTask, TimerKind};
use crate::transport::{ConnectRequest, Socket, Transport};

/// Connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub protocols: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(stream::CONNECT_TIMEOUT_MS),
            backoff: BackoffPolicy::default(),
            protocols: Vec::new(),
            headers: Vec::new(),
            channel_capacity: stream::CHANNEL_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Build from the application config. The session cookie, when set, is
    /// sent with the handshake.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let mut headers = Vec::new();
        if !config.server.session_cookie.is_empty() {
            headers.push(("Cookie".to_string(), config.server.session_cookie.clone()));
        }
        Self {
            connect_timeout: Duration::from_millis(config.stream.connect_timeout_ms),
            backoff: BackoffPolicy::from_config(&config.stream),
            protocols: config.stream.protocols.clone(),
            headers,
            channel_capacity: stream::CHANNEL_CAPACITY,
        }
    }
}

/// A transport error observed on the socket of a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    pub generation: u64,
    pub message: String,
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[connection #{}] {}", self.generation, self.message)
    }
}

enum SocketCommand {
    Send(String),
    Close,
}

/// Handle to the driver task of the current socket.
struct SocketHandle {
    commands: mpsc::UnboundedSender<SocketCommand>,
    /// Set when the connect timeout fired; the socket must not reach `Open`.
    aborted: bool,
    _task: JoinHandle<()>,
}

struct ConnectionInner {
    state: ConnectionState,
    backoff: BackoffPolicy,
    generation: u64,
    socket: Option<SocketHandle>,
    timer: Option<ScheduledTask>,
}

struct Shared {
    request: ConnectRequest,
    connect_timeout: Duration,
    transport: Arc<dyn Transport>,
    inner: Mutex<ConnectionInner>,
    state_tx: broadcast::Sender<ConnectionState>,
    message_tx: broadcast::Sender<String>,
    error_tx: broadcast::Sender<SocketError>,
}

/// Reconnecting connection to the event stream.
///
/// Cheap to clone; all clones drive the same connection. Dropping every
/// clone shuts the socket down.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        endpoint: impl Into<String>,
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (state_tx, _) = broadcast::channel(capacity);
        let (message_tx, _) = broadcast::channel(capacity);
        let (error_tx, _) = broadcast::channel(capacity);

        let mut request = ConnectRequest::new(endpoint).with_protocols(config.protocols);
        request.headers = config.headers;

        Self {
            shared: Arc::new(Shared {
                request,
                connect_timeout: config.connect_timeout,
                transport,
                inner: Mutex::new(ConnectionInner {
                    state: ConnectionState::closed(),
                    backoff: config.backoff,
                    generation: 0,
                    socket: None,
                    timer: None,
                }),
                state_tx,
                message_tx,
                error_tx,
            }),
        }
    }

    /// Create a manager for the endpoint derived from the application config.
    pub fn from_app_config(config: &AppConfig, transport: Arc<dyn Transport>) -> SwResult<Self> {
        let endpoint = config.stream_endpoint()?;
        Ok(Self::new(
            endpoint,
            ConnectionConfig::from_app_config(config),
            transport,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.request.url
    }

    /// Snapshot of the most recently published state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.lock().state.ready_state
    }

    /// Delay the next unplanned disconnect will wait before reconnecting.
    pub fn current_interval(&self) -> Duration {
        self.shared.lock().backoff.current()
    }

    /// Generation of the current (or last) socket attempt.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.shared.lock().timer.as_ref().map(ScheduledTask::kind)
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Raw text of every inbound frame, in receipt order.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.shared.message_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<SocketError> {
        self.shared.error_tx.subscribe()
    }

    /// Open the connection. Does nothing while connecting or open.
    pub fn connect(&self) {
        let mut inner = self.shared.lock();
        let ready_state = inner.state.ready_state;
        match ready_state {
            ReadyState::Connecting | ReadyState::Open => {
                debug!("connect ignored: already {ready_state}");
            }
            ReadyState::Closing | ReadyState::Closed => self.shared.open_socket(&mut inner, false),
        }
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Returns whether a socket was asked to close. A pending reconnect is
    /// cancelled either way.
    pub fn close(&self) -> bool {
        let mut inner = self.shared.lock();
        let pending = inner.timer.take();

        if inner.socket.is_none() {
            if let Some(timer) = pending {
                // Nothing may resume this generation any more.
                inner.generation += 1;
                info!(
                    "pending {} for connection #{} cancelled",
                    timer.kind(),
                    timer.generation()
                );
                self.shared.publish_state(&mut inner, ConnectionState::closed());
            }
            return false;
        }

        if inner.state.ready_state != ReadyState::Closing {
            if let Some(socket) = inner.socket.as_ref() {
                let _ = socket.commands.send(SocketCommand::Close);
            }
            self.shared
                .publish_state(&mut inner, ConnectionState::new(ReadyState::Closing));
        }
        true
    }

    /// Close the connection and wait up to `grace` for the socket to finish
    /// closing.
    ///
    /// Returns false when there was no socket to close or it did not close
    /// in time.
    pub async fn close_and_wait(&self, grace: Duration) -> bool {
        let mut states = self.subscribe_state();
        if !self.close() {
            return false;
        }
        let closed = async {
            loop {
                match states.recv().await {
                    Ok(state) if state.ready_state == ReadyState::Closed => return true,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        match tokio::time::timeout(grace, closed).await {
            Ok(done) => done,
            Err(_) => {
                warn!("stream did not close within {}ms", grace.as_millis());
                false
            }
        }
    }

    /// Queue a text frame. Fails with [`SwError::NotConnected`] unless open.
    pub fn send(&self, data: impl Into<String>) -> SwResult<()> {
        let inner = self.shared.lock();
        if inner.state.ready_state != ReadyState::Open {
            return Err(SwError::NotConnected);
        }
        let socket = inner.socket.as_ref().ok_or(SwError::NotConnected)?;
        socket
            .commands
            .send(SocketCommand::Send(data.into()))
            .map_err(|_| SwError::NotConnected)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.request.url)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the lock held so notifications stay ordered.
    fn publish_state(&self, inner: &mut ConnectionInner, state: ConnectionState) {
        let old = inner.state;
        inner.state = state;
        info!("stream state: {} -> {}", old.ready_state, state);
        let _ = self.state_tx.send(state);
    }

    fn open_socket(self: &Arc<Self>, inner: &mut ConnectionInner, reconnecting: bool) {
        if !reconnecting {
            inner.backoff.reset();
        }
        inner.timer = None;
        inner.generation += 1;
        let generation = inner.generation;

        // Replacing a closing socket drops its command sender, which ends
        // its driver.
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive_socket(
            Arc::downgrade(self),
            Arc::clone(&self.transport),
            self.request.clone(),
            generation,
            rx,
        ));
        inner.socket = Some(SocketHandle {
            commands,
            aborted: false,
            _task: task,
        });

        info!("connecting to {} (connection #{generation})", self.request.url);
        self.publish_state(inner, ConnectionState::new(ReadyState::Connecting));

        let weak = Arc::downgrade(self);
        inner.timer = Some(ScheduledTask::spawn(
            TimerKind::ConnectTimeout,
            generation,
            self.connect_timeout,
            move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_connect_timeout(generation);
                }
            },
        ));
    }

    fn on_connect_timeout(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state.ready_state != ReadyState::Connecting {
            debug!("stale connect timeout for connection #{generation} ignored");
            return;
        }
        inner.timer = None;
        let err = SwError::ConnectionTimeout(self.connect_timeout.as_millis() as u64);
        warn!("connection #{generation}: {err}");
        if let Some(socket) = inner.socket.as_mut() {
            socket.aborted = true;
            // State stays Connecting so the close counts as unplanned.
            let _ = socket.commands.send(SocketCommand::Close);
        }
    }

    /// Returns false when the socket should be discarded instead.
    fn on_open(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state.ready_state != ReadyState::Connecting {
            return false;
        }
        match inner.socket.as_ref() {
            Some(socket) if !socket.aborted => {}
            _ => return false,
        }
        inner.timer = None;
        inner.backoff.reset();
        self.publish_state(&mut inner, ConnectionState::new(ReadyState::Open));
        true
    }

    fn on_message(&self, generation: u64, text: String) {
        let inner = self.lock();
        if inner.generation != generation {
            return;
        }
        debug!("connection #{generation}: frame of {} bytes", text.len());
        let _ = self.message_tx.send(text);
    }

    fn on_error(&self, generation: u64, err: SwError) {
        let inner = self.lock();
        if inner.generation != generation {
            debug!("error from superseded connection #{generation}: {err}");
            return;
        }
        if err.is_transport() {
            warn!("connection #{generation}: {err}");
        } else {
            // Not a network failure, e.g. an endpoint that does not parse.
            error!("connection #{generation}: {err}");
        }
        let _ = self.error_tx.send(SocketError {
            generation,
            message: err.to_string(),
        });
    }

    fn on_closed(self: &Arc<Self>, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("close of superseded connection #{generation} ignored");
            return;
        }
        inner.socket = None;
        inner.timer = None;

        if inner.state.ready_state == ReadyState::Closing {
            self.publish_state(&mut inner, ConnectionState::closed());
            return;
        }

        let delay = inner.backoff.next_delay();
        warn!(
            "connection #{generation} lost; reconnecting in {}ms",
            delay.as_millis()
        );
        self.publish_state(&mut inner, ConnectionState::reconnecting_in(delay));

        let weak = Arc::downgrade(self);
        inner.timer = Some(ScheduledTask::spawn(
            TimerKind::ReconnectDelay,
            generation,
            delay,
            move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_reconnect_due(generation);
                }
            },
        ));
    }

    fn on_reconnect_due(self: &Arc<Self>, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state.ready_state != ReadyState::Closed {
            debug!("stale reconnect timer for connection #{generation} ignored");
            return;
        }
        self.open_socket(&mut inner, true);
    }
}

/// Resolves once the owner asks the socket to close or goes away.
async fn shutdown_requested(commands: &mut mpsc::UnboundedReceiver<SocketCommand>) {
    loop {
        match commands.recv().await {
            Some(SocketCommand::Send(_)) => continue,
            Some(SocketCommand::Close) | None => return,
        }
    }
}

/// Drives one socket from handshake to close. Exclusively owns the socket.
async fn drive_socket(
    shared: Weak<Shared>,
    transport: Arc<dyn Transport>,
    request: ConnectRequest,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
) {
    let opened = tokio::select! {
        result = transport.open(&request) => Some(result),
        _ = shutdown_requested(&mut commands) => None,
    };

    let socket = match opened {
        Some(Ok(socket)) => socket,
        Some(Err(err)) => {
            if let Some(shared) = shared.upgrade() {
                shared.on_error(generation, err);
                shared.on_closed(generation);
            }
            return;
        }
        None => {
            debug!("connection #{generation} aborted before handshake");
            if let Some(shared) = shared.upgrade() {
                shared.on_closed(generation);
            }
            return;
        }
    };

    let Socket {
        mut writer,
        mut reader,
    } = socket;

    let accepted = shared
        .upgrade()
        .map(|shared| shared.on_open(generation))
        .unwrap_or(false);
    if !accepted {
        let _ = writer.close().await;
        if let Some(shared) = shared.upgrade() {
            shared.on_closed(generation);
        }
        return;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(text)) => {
                    if let Err(err) = writer.send_text(text).await {
                        match shared.upgrade() {
                            Some(shared) => shared.on_error(generation, err),
                            None => break,
                        }
                    }
                }
                Some(SocketCommand::Close) | None => {
                    if let Err(err) = writer.close().await {
                        debug!("connection #{generation}: {err}");
                    }
                    break;
                }
            },
            frame = reader.recv() => {
                let Some(shared) = shared.upgrade() else { break };
                match frame {
                    Some(Ok(text)) => shared.on_message(generation, text),
                    Some(Err(err)) => shared.on_error(generation, err),
                    None => break,
                }
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        shared.on_closed(generation);
    }
}

//! In-memory transport for exercising the connection manager without a
//! network. Enabled for this crate's tests and, through the `testing`
//! feature, for dependent crates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use sw_core::error::{SwError, SwResult};

use crate::transport::{ConnectRequest, Socket, SocketReader, SocketWriter, Transport};

/// How [`MockTransport::open`] behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMode {
    /// Complete the handshake immediately.
    Accept,
    /// Never complete the handshake.
    Hang,
    /// Fail the handshake with a transport error.
    Refuse(String),
}

#[derive(Debug)]
enum MockFrame {
    Text(String),
    Error(String),
    HangUp,
}

struct MockState {
    mode: OpenMode,
    requests: Vec<ConnectRequest>,
    remotes: Vec<MockRemote>,
}

/// Transport whose sockets are controlled from the test through
/// [`MockRemote`] handles.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_mode(OpenMode::Accept)
    }

    pub fn hanging() -> Self {
        Self::with_mode(OpenMode::Hang)
    }

    pub fn refusing(message: impl Into<String>) -> Self {
        Self::with_mode(OpenMode::Refuse(message.into()))
    }

    pub fn with_mode(mode: OpenMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                mode,
                requests: Vec::new(),
                remotes: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies to subsequent `open` calls.
    pub fn set_mode(&self, mode: OpenMode) {
        self.lock().mode = mode;
    }

    /// Number of `open` calls so far, whatever their outcome.
    pub fn open_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.lock().requests.clone()
    }

    /// Remote end of the most recently accepted socket.
    pub fn last_remote(&self) -> Option<MockRemote> {
        self.lock().remotes.last().cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, request: &ConnectRequest) -> SwResult<Socket> {
        let mode = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state.mode.clone()
        };

        match mode {
            OpenMode::Hang => std::future::pending().await,
            OpenMode::Refuse(message) => Err(SwError::Transport(message)),
            OpenMode::Accept => {
                let (frames_tx, frames_rx) = mpsc::unbounded_channel();
                let remote = MockRemote {
                    frames: frames_tx,
                    sent: Arc::new(Mutex::new(Vec::new())),
                    closed: Arc::new(AtomicBool::new(false)),
                };
                self.lock().remotes.push(remote.clone());
                Ok(Socket {
                    writer: Box::new(MockWriter {
                        sent: Arc::clone(&remote.sent),
                        closed: Arc::clone(&remote.closed),
                    }),
                    reader: Box::new(MockReader { frames: frames_rx }),
                })
            }
        }
    }
}

/// Server side of an accepted mock socket.
#[derive(Clone)]
pub struct MockRemote {
    frames: mpsc::UnboundedSender<MockFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockRemote {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(MockFrame::Text(text.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.frames.send(MockFrame::Error(message.into()));
    }

    /// Drop the connection from the server side.
    pub fn hang_up(&self) {
        let _ = self.frames.send(MockFrame::HangUp);
    }

    /// Frames the client has written so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn closed_by_client(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockWriter {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SocketWriter for MockWriter {
    async fn send_text(&mut self, text: String) -> SwResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SwError::Transport("socket already closed".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
        Ok(())
    }

    async fn close(&mut self) -> SwResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockReader {
    frames: mpsc::UnboundedReceiver<MockFrame>,
}

#[async_trait]
impl SocketReader for MockReader {
    async fn recv(&mut self) -> Option<SwResult<String>> {
        match self.frames.recv().await? {
            MockFrame::Text(text) => Some(Ok(text)),
            MockFrame::Error(message) => Some(Err(SwError::Transport(message))),
            MockFrame::HangUp => None,
        }
    }
}

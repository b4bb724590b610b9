//! Socket construction capability.
//!
//! The connection manager never touches the network directly: it asks a
//! [`Transport`] to open a socket and then drives the two halves it gets
//! back. Production code uses [`TungsteniteTransport`]; tests plug in an
//! in-memory transport.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use sw_core::error::{SwError, SwResult};

/// Everything needed to open one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub protocols: Vec<String>,
    /// Extra handshake headers, e.g. the session cookie.
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Outbound half of an open socket.
#[async_trait]
pub trait SocketWriter: Send {
    async fn send_text(&mut self, text: String) -> SwResult<()>;

    /// Start the closing handshake.
    async fn close(&mut self) -> SwResult<()>;
}

/// Inbound half of an open socket.
#[async_trait]
pub trait SocketReader: Send {
    /// Next text frame. `None` means the socket is closed; an `Err` is a
    /// transport error and the socket may or may not still be usable.
    async fn recv(&mut self) -> Option<SwResult<String>>;
}

/// An open socket, split into independently owned halves.
pub struct Socket {
    pub writer: Box<dyn SocketWriter>,
    pub reader: Box<dyn SocketReader>,
}

/// Opens sockets. Resolves once the handshake completes.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, request: &ConnectRequest) -> SwResult<Socket>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(&self, request: &ConnectRequest) -> SwResult<Socket> {
        let mut handshake = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SwError::Config(format!("invalid stream url {}: {e}", request.url)))?;

        let headers = handshake.headers_mut();
        if !request.protocols.is_empty() {
            let protocols = HeaderValue::from_str(&request.protocols.join(", "))
                .map_err(|e| SwError::Config(format!("invalid subprotocol list: {e}")))?;
            headers.insert("Sec-WebSocket-Protocol", protocols);
        }
        for (name, value) in &request.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| SwError::Config(format!("invalid {name} header: {e}")))?;
            let name = tokio_tungstenite::tungstenite::http::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SwError::Config(format!("invalid header name {name}: {e}")))?;
            headers.insert(name, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(handshake)
            .await
            .map_err(|e| SwError::Transport(format!("connect to {} failed: {e}", request.url)))?;
        debug!("websocket handshake complete: status={}", response.status());

        let (sink, stream) = stream.split();
        Ok(Socket {
            writer: Box::new(TungsteniteWriter { sink }),
            reader: Box::new(TungsteniteReader {
                stream,
                finished: false,
            }),
        })
    }
}

struct TungsteniteWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketWriter for TungsteniteWriter {
    async fn send_text(&mut self, text: String) -> SwResult<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SwError::Transport(format!("send failed: {e}")))
    }

    async fn close(&mut self) -> SwResult<()> {
        self.sink
            .close()
            .await
            .map_err(|e| SwError::Transport(format!("close failed: {e}")))
    }
}

struct TungsteniteReader {
    stream: SplitStream<WsStream>,
    finished: bool,
}

#[async_trait]
impl SocketReader for TungsteniteReader {
    async fn recv(&mut self) -> Option<SwResult<String>> {
        if self.finished {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => {
                    return Some(String::from_utf8(data.to_vec()).map_err(|_| {
                        SwError::Transport("binary frame is not valid UTF-8".into())
                    }))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("server closed the stream: {frame:?}");
                    self.finished = true;
                    return None;
                }
                // Ping/pong replies are queued by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(SwError::Transport(format!("receive failed: {e}"))));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

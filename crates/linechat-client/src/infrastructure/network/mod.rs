//! Network infrastructure for the client application.
//!
//! [`ChatClient`] dials the server once, owns the resulting
//! [`Connection`], and turns everything the connection observes into
//! [`ClientEvent`]s.
//!
//! # Where does client code run? (for beginners)
//!
//! The connection's read and write loops run on their own tokio tasks.  They
//! never call back into `ChatClient`; they push onto a dispatch queue.  The
//! code that owns `&mut ChatClient` (the terminal loop in `main.rs`, or a test)
//! pulls from that queue with [`ChatClient::drain_inbound`] or
//! [`ChatClient::next_inbound`] + [`ChatClient::handle_inbound`].  So every
//! `ClientEvent` is emitted from the owner's context, never from a socket task.
//!
//! # State machine
//!
//! ```text
//! Disconnected ──initialize()──► Connecting ──ok──► Connected ──run()──► Running
//!      ▲                              │                                     │
//!      └───────────── error ──────────┘                                     │
//!      └──────────────────────────────── close() ──────────────────────────┘
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use linechat_core::protocol::CLIENT_LOG_SENDER;
use linechat_core::{
    encode_request, Connection, ConnectionConfig, ConnectionEvent, ConnectionEventKind,
    ConnectionId, DispatchQueue, Message, ProtocolError, Request, SendError, TransportError,
    TransportErrorKind, DEFAULT_PORT,
};
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::application::handle_response::{handle_response, ResponseOutcome};

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server address could not be resolved to any socket address.
    #[error("could not resolve server address {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// No connection was established within the configured timeout.
    #[error("timed out connecting to {address} after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },
    /// The operation needs a running connection.
    #[error("client is not running")]
    NotRunning,
    /// A request could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The connection refused to queue a request.
    #[error("request not queued: {0}")]
    Send(#[from] SendError),
}

/// Configuration for the client's network connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Port used when the server address names none.
    pub default_port: u16,
    pub connect_timeout: Duration,
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            connection: ConnectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Running,
}

/// Events emitted by the network layer to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The TCP connection was established.
    Connected { peer: SocketAddr },
    /// The connection was closed.  Always preceded by a `"Disconnected"`
    /// system message.
    Disconnected,
    /// A relayed chat message or a locally synthesized status line.
    MessageReceived(Message),
}

/// Chat client: one connection to one server.
pub struct ChatClient {
    config: ClientConfig,
    state: ClientState,
    connection: Option<Connection>,
    inbound: DispatchQueue<ConnectionEvent>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl ChatClient {
    /// Creates a disconnected client and returns it together with the event receiver.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            state: ClientState::Disconnected,
            connection: None,
            inbound: DispatchQueue::new(),
            events,
        };
        (client, events_rx)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Resolves `address` and connects to the server.
    ///
    /// `address` may be `host`, `host:port`, or an IPv4/IPv6 literal with or
    /// without a port.  A single attempt is made per resolved address, within
    /// the configured timeout overall.  Does nothing unless the client is
    /// `Disconnected`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resolve`], [`ClientError::ConnectFailed`], or
    /// [`ClientError::ConnectTimeout`].  The client stays `Disconnected`.
    pub async fn initialize(&mut self, address: &str) -> Result<(), ClientError> {
        if self.state != ClientState::Disconnected {
            debug!(state = ?self.state, "initialize ignored");
            return Ok(());
        }

        self.state = ClientState::Connecting;
        match self.dial(address).await {
            Ok(connection) => {
                let peer = connection.peer();
                info!(%peer, "connected to server");
                self.connection = Some(connection);
                self.state = ClientState::Connected;
                self.emit(ClientEvent::Connected { peer });
                Ok(())
            }
            Err(e) => {
                warn!("unable to connect to server: {e}");
                self.state = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    /// Starts the connection's read and write loops.
    ///
    /// Returns `false` without doing anything unless the client is `Connected`.
    pub fn run(&mut self) -> bool {
        if self.state != ClientState::Connected {
            return false;
        }
        let Some(connection) = self.connection.as_ref() else {
            return false;
        };
        connection.run();
        self.state = ClientState::Running;
        true
    }

    /// Closes the connection, emitting a `"Disconnected"` system message and
    /// then [`ClientEvent::Disconnected`].
    ///
    /// Returns `true` if this call closed the client.  Does nothing and
    /// returns `false` unless the client is `Running`.
    pub async fn close(&mut self) -> bool {
        if self.state != ClientState::Running {
            return false;
        }
        let Some(connection) = self.connection.take() else {
            return false;
        };

        connection.close().await;
        self.state = ClientState::Disconnected;
        info!(peer = %connection.peer(), "disconnected from server");
        self.emit(ClientEvent::MessageReceived(Message::system(
            CLIENT_LOG_SENDER,
            "Disconnected",
        )));
        self.emit(ClientEvent::Disconnected);
        true
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Sends a chat line authored by `sender`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`ChatClient::send`].
    pub fn send_message(
        &self,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Message::new(sender, body))
    }

    /// Queues `message` as a `SendMessage` request and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotRunning`] unless the client is `Running`.
    /// - [`ClientError::Send`] if the connection refused the record.
    pub fn send(&self, message: Message) -> Result<(), ClientError> {
        if self.state != ClientState::Running {
            return Err(ClientError::NotRunning);
        }
        let connection = self.connection.as_ref().ok_or(ClientError::NotRunning)?;
        let record = encode_request(&Request::send_message(&message)?)?;
        connection.send(record)?;
        Ok(())
    }

    // ── Inbound processing ────────────────────────────────────────────────────

    /// Handles every inbound event buffered right now.  Returns how many.
    pub async fn drain_inbound(&mut self) -> usize {
        let events = self.inbound.drain();
        let handled = events.len();
        for event in events {
            self.handle_inbound(event).await;
        }
        handled
    }

    /// Waits for the next inbound event without handling it.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` beside other input.
    /// Pass the result to [`ChatClient::handle_inbound`].
    pub async fn next_inbound(&mut self) -> Option<ConnectionEvent> {
        self.inbound.next().await
    }

    /// Handles one inbound event from the connection's loops.
    pub async fn handle_inbound(&mut self, event: ConnectionEvent) {
        let current = self.connection.as_ref().map(Connection::id);
        if current != Some(event.connection) {
            trace!(connection = %event.connection, "event from a previous connection ignored");
            return;
        }

        match event.kind {
            ConnectionEventKind::Record(record) => self.on_record(&record),
            ConnectionEventKind::Fault(error) => self.on_fault(error).await,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClientState::Running
    }

    /// Address of the server, while connected.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(Connection::peer)
    }

    /// Id of the current connection.  Inbound events carrying any other id
    /// are ignored.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(Connection::id)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn dial(&self, address: &str) -> Result<Connection, ClientError> {
        let timeout = self.config.connect_timeout;
        let (stream, addr) =
            tokio::time::timeout(timeout, connect_any(address, self.config.default_port))
                .await
                .map_err(|_| ClientError::ConnectTimeout {
                    address: address.to_string(),
                    timeout,
                })??;

        Connection::from_tcp(stream, self.config.connection, self.inbound.handle())
            .map_err(|source| ClientError::ConnectFailed { addr, source })
    }

    fn on_record(&self, record: &str) {
        match handle_response(record) {
            ResponseOutcome::Deliver(message) => self.emit(ClientEvent::MessageReceived(message)),
            ResponseOutcome::Rejected {
                op_code,
                error_code,
            } => warn!(?op_code, ?error_code, "server rejected request"),
            ResponseOutcome::Ignored(op_code) => debug!(?op_code, "response ignored"),
            ResponseOutcome::Undecodable(e) => warn!("discarding undecodable response: {e}"),
        }
    }

    async fn on_fault(&mut self, error: TransportError) {
        match error.kind() {
            TransportErrorKind::Disconnected => {
                debug!(%error, "connection lost");
                self.close().await;
            }
            TransportErrorKind::MalformedInput => {
                warn!(%error, "malformed input from server");
                self.emit_notice(&error);
            }
            TransportErrorKind::Other => {
                error!(%error, "connection failed");
                self.emit_notice(&error);
                self.close().await;
            }
        }
    }

    fn emit_notice(&self, error: &TransportError) {
        self.emit(ClientEvent::MessageReceived(Message::system(
            CLIENT_LOG_SENDER,
            format!("Exception thrown : {error}"),
        )));
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            trace!("client event receiver dropped");
        }
    }
}

/// Tries each resolved address in turn and returns the first stream that connects.
async fn connect_any(
    address: &str,
    default_port: u16,
) -> Result<(TcpStream, SocketAddr), ClientError> {
    let mut last_error = None;
    for addr in resolve_target(address, default_port).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(source) => {
                debug!(%addr, "connect attempt failed: {source}");
                last_error = Some(ClientError::ConnectFailed { addr, source });
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ClientError::Resolve {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
    }))
}

/// Resolves a user-supplied server address.
///
/// Accepts `host`, `host:port`, `a.b.c.d[:port]`, `[v6][:port]`, and bare
/// IPv6 literals.  `default_port` applies when no port is given.
///
/// # Errors
///
/// Returns [`ClientError::Resolve`] if name resolution fails or yields nothing.
pub async fn resolve_target(
    address: &str,
    default_port: u16,
) -> Result<Vec<SocketAddr>, ClientError> {
    let address = address.trim();
    let resolve_failed = |source| ClientError::Resolve {
        address: address.to_string(),
        source,
    };

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    let unbracketed = address
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(address);
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, port),
            Err(_) => {
                return Err(resolve_failed(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid port {port:?}"),
                )))
            }
        },
        None => (address, default_port),
    };

    let targets: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(resolve_failed)?
        .collect();
    if targets.is_empty() {
        return Err(resolve_failed(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses found",
        )));
    }
    Ok(targets)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

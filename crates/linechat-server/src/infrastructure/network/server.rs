//! ChatServer: TCP listener, accept loop, and the server's dispatch context.
//!
//! # Task layout (for beginners)
//!
//! ```text
//!  accept task ──Accepted(conn)──┐
//!  conn A read task ──Record──── ┼──► DispatchQueue ──► ChatServer::dispatch
//!  conn B read task ──Fault───── ┘                         │
//!                                                          ├─ registry (no lock)
//!                                                          ├─ conn.send(...) ──► write tasks
//!                                                          └─ observer channel
//! ```
//!
//! Socket tasks never touch the registry.  Everything they observe is pushed
//! onto the dispatch queue, and whoever holds `&mut ChatServer` drains it with
//! [`ChatServer::dispatch_next`], [`ChatServer::drain_pending`], or
//! [`ChatServer::run_until`].
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──initialize()──► Listening ──start_accepting()──► Accepting
//!       ▲                                                              │
//!       └──────────────────────────── shutdown() ─────────────────────┘
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use linechat_core::protocol::SERVER_LOG_SENDER;
use linechat_core::{
    encode_response, Connection, ConnectionConfig, ConnectionEvent, ConnectionEventKind,
    ConnectionId, DispatchHandle, DispatchQueue, ErrorCode, Message, OpCode, Response,
    TransportError, TransportErrorKind, DEFAULT_PORT,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::application::handle_request::{handle_request, RequestOutcome};
use crate::application::registry::ConnectionRegistry;

/// Pause after a failed `accept` so a persistent failure (for example running
/// out of file descriptors) does not spin the accept task.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for server lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server is not listening; call initialize() first")]
    NotInitialized,
}

/// Runtime settings for the listener and every accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.  `"0.0.0.0"` binds all IPv4 interfaces.
    pub bind_address: String,
    pub port: u16,
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            connection: ConnectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Listening,
    Accepting,
}

/// Everything the dispatch context can be asked to handle.
#[derive(Debug)]
pub enum ServerEvent {
    /// A socket was accepted and wrapped; its loops are not running yet.
    Accepted(Arc<Connection>),
    /// A record or fault from a connection's loops.
    Connection(ConnectionEvent),
    /// `accept` itself failed.  The accept loop keeps going.
    AcceptFailed(io::Error),
}

impl From<ConnectionEvent> for ServerEvent {
    fn from(event: ConnectionEvent) -> Self {
        ServerEvent::Connection(event)
    }
}

/// The chat relay server.
///
/// Constructed once by the binary (or a test) and driven by whoever owns it.
pub struct ChatServer {
    config: ServerConfig,
    state: ServerState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
    events: DispatchQueue<ServerEvent>,
    registry: ConnectionRegistry,
    observer: mpsc::UnboundedSender<Message>,
}

impl ChatServer {
    /// Creates a server and returns it together with the observer receiver.
    ///
    /// The observer sees every relayed chat message plus a system message for
    /// each client that connects or disconnects.
    pub fn new(config: ServerConfig) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (observer, observer_rx) = mpsc::unbounded_channel();
        let (stop, _) = watch::channel(false);
        let server = Self {
            config,
            state: ServerState::Uninitialized,
            listener: None,
            local_addr: None,
            accept_task: None,
            stop,
            events: DispatchQueue::new(),
            registry: ConnectionRegistry::new(),
            observer,
        };
        (server, observer_rx)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Binds and listens on the configured address.
    ///
    /// Calling it again once listening is a no-op that returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the address is unusable or taken.
    /// The server stays `Uninitialized`.
    pub async fn initialize(&mut self) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }

        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let bind_failed = |source| ServerError::BindFailed {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind((self.config.bind_address.as_str(), self.config.port))
            .await
            .map_err(bind_failed)?;
        let local_addr = listener.local_addr().map_err(bind_failed)?;

        info!(%local_addr, "listening");
        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        self.state = ServerState::Listening;
        Ok(local_addr)
    }

    /// Starts the accept loop on its own task.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotInitialized`] if [`ChatServer::initialize`]
    /// has not succeeded.  Calling it while already accepting is a no-op.
    pub fn start_accepting(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Uninitialized => return Err(ServerError::NotInitialized),
            ServerState::Accepting => return Ok(()),
            ServerState::Listening => {}
        }
        let listener = self.listener.take().ok_or(ServerError::NotInitialized)?;

        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            self.events.handle(),
            self.config.connection,
            self.stop.subscribe(),
        )));
        self.state = ServerState::Accepting;
        debug!("accept loop started");
        Ok(())
    }

    /// Stops accepting, closes every registered connection, and returns the
    /// server to `Uninitialized`.
    pub async fn shutdown(&mut self) {
        self.stop.send_replace(true);
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                error!("accept loop ended abnormally: {e}");
            }
        }
        self.listener = None;

        let connections = self.registry.snapshot();
        for connection in &connections {
            connection.close().await;
        }
        self.registry = ConnectionRegistry::new();

        // Accepted sockets that never reached dispatch are closed by dropping them.
        let discarded = self.events.drain().len();
        if discarded > 0 {
            debug!(discarded, "dropped undispatched events at shutdown");
        }

        self.stop = watch::channel(false).0;
        self.local_addr = None;
        self.state = ServerState::Uninitialized;
        info!(closed = connections.len(), "server stopped");
    }

    // ── Dispatch driving ──────────────────────────────────────────────────────

    /// Waits for the next event and handles it.
    ///
    /// The wait is cancel-safe; once an event is taken it is handled to
    /// completion.
    pub async fn dispatch_next(&mut self) {
        if let Some(event) = self.events.next().await {
            self.dispatch(event).await;
        }
    }

    /// Handles every event buffered right now without waiting for more.
    /// Returns how many were handled.
    pub async fn drain_pending(&mut self) -> usize {
        let events = self.events.drain();
        let handled = events.len();
        for event in events {
            self.dispatch(event).await;
        }
        handled
    }

    /// Dispatches events until `shutdown` resolves, then shuts the server down.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let event = tokio::select! {
                _ = &mut shutdown => break,
                event = self.events.next() => event,
            };
            match event {
                Some(event) => self.dispatch(event).await,
                None => break,
            }
        }
        self.shutdown().await;
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The bound address, once listening.  Useful when binding port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Ids of registered connections in broadcast order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    // ── Dispatch context ──────────────────────────────────────────────────────

    async fn dispatch(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Accepted(connection) => self.on_accepted(connection),
            ServerEvent::Connection(ConnectionEvent { connection, kind }) => match kind {
                ConnectionEventKind::Record(record) => self.on_record(connection, &record),
                ConnectionEventKind::Fault(error) => self.on_fault(connection, error).await,
            },
            ServerEvent::AcceptFailed(e) => error!("accept failed: {e}"),
        }
    }

    fn on_accepted(&mut self, connection: Arc<Connection>) {
        if self.state != ServerState::Accepting {
            debug!(peer = %connection.peer(), "dropping connection accepted during shutdown");
            return;
        }
        if !connection.run() {
            warn!(connection = %connection.id(), "accepted connection could not be started");
            return;
        }

        let peer = connection.peer();
        let id = connection.id();
        self.registry.register(connection);
        info!(connection = %id, %peer, clients = self.registry.len(), "client connected");
        self.notify(Message::system(
            SERVER_LOG_SENDER,
            format!("connected with {} at port {}", peer.ip(), peer.port()),
        ));
    }

    fn on_record(&mut self, id: ConnectionId, record: &str) {
        match handle_request(record, Utc::now()) {
            RequestOutcome::Reply(response) => self.reply(id, &response),
            RequestOutcome::Broadcast { response, message } => {
                debug!(connection = %id, sender = %message.sender, "relaying message");
                self.broadcast(&response);
                self.notify(message);
            }
        }
    }

    async fn on_fault(&mut self, id: ConnectionId, error: TransportError) {
        let kind = error.kind();
        if kind == TransportErrorKind::MalformedInput {
            warn!(connection = %id, %error, "malformed input");
            self.reply(id, &Response::error(OpCode::None, ErrorCode::BadPacket));
            return;
        }

        let Some(connection) = self.registry.get(id).cloned() else {
            error!(connection = %id, %error, "fault on unregistered connection");
            return;
        };

        match kind {
            TransportErrorKind::Other => error!(connection = %id, %error, "connection failed"),
            _ => debug!(connection = %id, %error, "connection lost"),
        }

        if connection.close().await {
            self.registry.remove(id);
            info!(connection = %id, clients = self.registry.len(), "client disconnected");
            self.notify(Message::system(SERVER_LOG_SENDER, "Disconnected Client"));
        }
    }

    fn reply(&self, id: ConnectionId, response: &Response) {
        let Some(connection) = self.registry.get(id) else {
            warn!(connection = %id, "reply to unregistered connection dropped");
            return;
        };
        match encode_response(response) {
            Ok(record) => {
                if let Err(e) = connection.send(record) {
                    debug!(connection = %id, "reply not queued: {e}");
                }
            }
            Err(e) => error!(connection = %id, "failed to encode reply: {e}"),
        }
    }

    fn broadcast(&self, response: &Response) {
        let record = match encode_response(response) {
            Ok(record) => record,
            Err(e) => {
                error!("failed to encode broadcast: {e}");
                return;
            }
        };
        for connection in self.registry.iter() {
            if let Err(e) = connection.send(record.clone()) {
                debug!(connection = %connection.id(), "broadcast not queued: {e}");
            }
        }
    }

    fn notify(&self, message: Message) {
        if self.observer.send(message).is_err() {
            trace!("observer receiver dropped");
        }
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

async fn accept_loop(
    listener: TcpListener,
    events: DispatchHandle<ServerEvent>,
    config: ConnectionConfig,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => match Connection::from_tcp(stream, config, events.clone()) {
                Ok(connection) => {
                    trace!(%peer, "accepted");
                    if !events.push(ServerEvent::Accepted(Arc::new(connection))) {
                        break;
                    }
                }
                Err(e) => warn!(%peer, "dropping accepted socket: {e}"),
            },
            Err(e) => {
                if !events.push(ServerEvent::AcceptFailed(e)) {
                    break;
                }
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
    debug!("accept loop exited");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

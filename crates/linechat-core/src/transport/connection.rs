//! The per-socket connection engine.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!  new() ──► run() ──► [read loop + write loop on their own tasks] ──► close()
//!    │                                                                   ▲
//!    └──────────────────────── close() (never ran) ──────────────────────┘
//! ```
//!
//! - The **read loop** turns incoming bytes into records and hands each one to
//!   the [`EventSink`].
//! - The **write loop** drains the outbound queue that [`Connection::send`]
//!   fills, writing one record per line.
//! - Both loops watch a shared stop signal.  A blocked read or write is raced
//!   against it with `tokio::select!`, so [`Connection::close`] never waits on
//!   a peer that has gone quiet.
//!
//! Faults are reported through the same sink.  A terminal fault stops both
//! loops, and only the first terminal fault of a connection is reported.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::transport::dispatch::DispatchHandle;
use crate::transport::error::TransportError;
use crate::transport::framing::{read_record, write_record, RecordRead};

/// Unique identifier assigned to each connection at construction.
pub type ConnectionId = Uuid;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Limits applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Longest accepted inbound record in bytes, excluding the line terminator.
    #[serde(default = "default_max_record_len")]
    pub max_record_len: usize,
    /// Records allowed to wait in the outbound queue before the peer is
    /// considered stalled and the connection is failed.
    #[serde(default = "default_outbound_high_water")]
    pub outbound_high_water: usize,
}

fn default_max_record_len() -> usize {
    64 * 1024
}

fn default_outbound_high_water() -> usize {
    1024
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_record_len: default_max_record_len(),
            outbound_high_water: default_outbound_high_water(),
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Something a connection's loops observed.
#[derive(Debug)]
pub struct ConnectionEvent {
    pub connection: ConnectionId,
    pub kind: ConnectionEventKind,
}

#[derive(Debug)]
pub enum ConnectionEventKind {
    /// One complete inbound record, terminator removed.
    Record(String),
    /// A transport failure.  See [`TransportError::kind`] for how to react.
    Fault(TransportError),
}

/// Receives every event a connection produces.
///
/// Installed once at construction and called from the connection's loop
/// tasks, so implementations must be cheap and must not block.  Pushing onto a
/// [`DispatchHandle`] is the usual choice.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(&self, event: ConnectionEvent);
}

impl<T> EventSink for DispatchHandle<T>
where
    T: From<ConnectionEvent> + Send + 'static,
{
    fn deliver(&self, event: ConnectionEvent) {
        let connection = event.connection;
        if !self.push(T::from(event)) {
            trace!(%connection, "dispatch queue dropped; discarding connection event");
        }
    }
}

/// Why [`Connection::send`] refused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,
    #[error("peer stalled: more than {limit} records waiting to be written")]
    Stalled { limit: usize },
}

// ── Internal state ────────────────────────────────────────────────────────────

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

enum LoopState {
    /// Constructed, loops not started yet.
    Pending {
        reader: BoxedReader,
        writer: BoxedWriter,
        outbound: mpsc::UnboundedReceiver<String>,
    },
    Running {
        read: JoinHandle<()>,
        write: JoinHandle<()>,
    },
    Closed,
}

/// State shared between the connection handle and its two loop tasks.
struct Shared {
    id: ConnectionId,
    sink: Box<dyn EventSink>,
    stop: watch::Sender<bool>,
    fault_reported: AtomicBool,
    pending: AtomicUsize,
}

impl Shared {
    fn deliver(&self, kind: ConnectionEventKind) {
        self.sink.deliver(ConnectionEvent {
            connection: self.id,
            kind,
        });
    }

    /// Reports a terminal fault (first one only) and stops both loops.
    fn fail(&self, error: TransportError) {
        if !self.fault_reported.swap(true, Ordering::AcqRel) {
            debug!(connection = %self.id, error = %error, "connection fault");
            self.deliver(ConnectionEventKind::Fault(error));
        }
        self.stop.send_replace(true);
    }
}

fn lock(loops: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    loops.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Connection ────────────────────────────────────────────────────────────────

/// One established stream plus the loops that service it.
pub struct Connection {
    shared: Arc<Shared>,
    peer: SocketAddr,
    config: ConnectionConfig,
    outbound: mpsc::UnboundedSender<String>,
    running: AtomicBool,
    closing: AtomicBool,
    loops: Mutex<LoopState>,
}

impl Connection {
    /// Wraps an established stream.  No I/O happens until [`Connection::run`].
    pub fn new<S>(
        stream: S,
        peer: SocketAddr,
        config: ConnectionConfig,
        sink: impl EventSink,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                sink: Box::new(sink),
                stop,
                fault_reported: AtomicBool::new(false),
                pending: AtomicUsize::new(0),
            }),
            peer,
            config,
            outbound: outbound_tx,
            running: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            loops: Mutex::new(LoopState::Pending {
                reader: Box::new(reader),
                writer: Box::new(writer),
                outbound: outbound_rx,
            }),
        }
    }

    /// Wraps an accepted or dialled TCP stream.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the peer address cannot be read, which happens
    /// when the socket was already torn down.
    pub fn from_tcp(
        stream: TcpStream,
        config: ConnectionConfig,
        sink: impl EventSink,
    ) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, peer, config, sink))
    }

    /// Starts the read and write loops on the current tokio runtime.
    ///
    /// Returns `false` without doing anything if the loops were already
    /// started or the connection has been closed.
    pub fn run(&self) -> bool {
        let mut loops = lock(&self.loops);
        match std::mem::replace(&mut *loops, LoopState::Closed) {
            LoopState::Pending {
                reader,
                writer,
                outbound,
            } => {
                let read = tokio::spawn(read_loop(
                    Arc::clone(&self.shared),
                    BufReader::new(reader),
                    self.config.max_record_len,
                ));
                let write = tokio::spawn(write_loop(Arc::clone(&self.shared), writer, outbound));
                *loops = LoopState::Running { read, write };
                self.running.store(true, Ordering::Release);
                debug!(connection = %self.shared.id, peer = %self.peer, "connection loops started");
                true
            }
            other => {
                *loops = other;
                false
            }
        }
    }

    /// Queues `record` for the write loop and returns immediately.
    ///
    /// Records from one caller are written in the order they were queued.
    ///
    /// # Errors
    ///
    /// - [`SendError::Closed`] once the connection is closing or its write
    ///   loop has exited.
    /// - [`SendError::Stalled`] when the outbound queue is already at its
    ///   high-water mark.  The connection is failed with a disconnect fault,
    ///   so the owner cleans it up through its normal fault path.
    pub fn send(&self, record: String) -> Result<(), SendError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }

        let limit = self.config.outbound_high_water;
        let queued = self.shared.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if queued > limit {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            self.shared.fail(TransportError::Stalled { limit });
            return Err(SendError::Stalled { limit });
        }

        if self.outbound.send(record).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(SendError::Closed);
        }
        Ok(())
    }

    /// Stops both loops, waits for them to exit, and releases the socket.
    ///
    /// Safe to call from any number of tasks at once and in any state.
    /// Exactly one call performs the close and returns `true`; every other
    /// call returns `false` immediately.  Records still queued are dropped.
    pub async fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shared.stop.send_replace(true);

        let previous = {
            let mut loops = lock(&self.loops);
            std::mem::replace(&mut *loops, LoopState::Closed)
        };
        if let LoopState::Running { read, write } = previous {
            for (name, handle) in [("read", read), ("write", write)] {
                if let Err(e) = handle.await {
                    error!(connection = %self.shared.id, "{name} loop ended abnormally: {e}");
                }
            }
        }

        self.running.store(false, Ordering::Release);
        debug!(connection = %self.shared.id, peer = %self.peer, "connection closed");
        true
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// `true` between a successful [`Connection::run`] and the end of
    /// [`Connection::close`].
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Records queued but not yet taken by the write loop.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("peer", &self.peer)
            .field("running", &self.is_running())
            .field("closing", &self.is_closing())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Loops of a connection that was never closed must not outlive it.
        self.shared.stop.send_replace(true);
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

async fn read_loop(shared: Arc<Shared>, mut reader: BufReader<BoxedReader>, limit: usize) {
    let mut stop = shared.stop.subscribe();
    let mut buf = Vec::with_capacity(1024);

    loop {
        let result = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            result = read_record(&mut reader, limit, &mut buf) => result,
        };

        match result {
            Ok(RecordRead::Record(record)) => {
                trace!(connection = %shared.id, len = record.len(), "record received");
                shared.deliver(ConnectionEventKind::Record(record));
            }
            Ok(RecordRead::Oversized(len)) => {
                shared.deliver(ConnectionEventKind::Fault(TransportError::RecordTooLong {
                    len,
                    limit,
                }));
            }
            Ok(RecordRead::Eof) => {
                shared.fail(TransportError::Closed);
                break;
            }
            Err(e) => {
                shared.fail(TransportError::from_io(e));
                break;
            }
        }
    }

    trace!(connection = %shared.id, "read loop exited");
}

async fn write_loop(
    shared: Arc<Shared>,
    mut writer: BoxedWriter,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut stop = shared.stop.subscribe();

    loop {
        let record = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            next = outbound.recv() => match next {
                Some(record) => record,
                None => break,
            },
        };
        shared.pending.fetch_sub(1, Ordering::AcqRel);

        let written = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            written = write_record(&mut writer, &record) => written,
        };
        if let Err(e) = written {
            shared.fail(TransportError::from_io(e));
            break;
        }
    }

    // Half-close so the peer's reader sees EOF before the socket is dropped.
    if let Err(e) = writer.shutdown().await {
        trace!(connection = %shared.id, "shutdown after write loop: {e}");
    }
    trace!(connection = %shared.id, "write loop exited");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

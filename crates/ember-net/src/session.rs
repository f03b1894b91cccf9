//! Per-connection session: the read state machine and the single-writer
//! outbound path.
//!
//! A [`Session`] exclusively owns the read half of one accepted duplex
//! stream and alternates between two states: awaiting a 2-byte length
//! header, then awaiting exactly that many payload bytes. Each completed
//! frame is split into opcode + body and handed to the dispatch registry
//! synchronously before the next header read is armed.
//!
//! Other tasks interact with a session only through its cloneable
//! [`SessionHandle`], whose `send`/`close` are the sole thread-safe entry
//! points. Outbound frames go through an unbounded FIFO drained under a
//! single-writer handoff: a sender either claims the writing state with a
//! CAS and spawns the drain, or trusts the drain already in progress to
//! pick up the entry it just enqueued. At most one write is ever in flight
//! on the stream.
//!
//! Every terminal condition (EOF, I/O error, protocol violation, decode
//! failure, local close) funnels into one disconnect path, so
//! `on_connect`/`on_disconnect` each fire exactly once per session.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::dispatch::{DispatchOutcome, DispatchRegistry};
use crate::framing::{self, FrameError, LENGTH_PREFIX_SIZE};
use crate::gateway::ConnectionId;

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Why a session ended. Delivered to [`SessionHooks::on_disconnect`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisconnectReason {
    /// The peer closed the connection (EOF).
    #[error("peer closed the connection")]
    PeerClosed,

    /// A read or write on the stream failed.
    #[error("transport error: {0:?}")]
    Io(ErrorKind),

    /// The peer declared a frame length outside `1..=MAX_FRAME_SIZE`, or a
    /// frame too short to carry an opcode. Unrecoverable: the length prefix
    /// is the only framing delimiter, so the stream cannot resynchronize.
    #[error("protocol violation: declared frame length {declared}")]
    ProtocolViolation {
        /// The length the peer declared.
        declared: u16,
    },

    /// A known opcode arrived with a body its registered decoder rejected.
    #[error("payload decode failed for opcode {opcode}")]
    DecodeFailure {
        /// The opcode whose decoder failed.
        opcode: u16,
    },

    /// `close()` was called by the owner or a handler.
    #[error("closed locally")]
    LocalClose,
}

/// Lifecycle notifications for a session.
///
/// Supplied as a trait object at session construction; both callbacks run
/// on the session's read task and must not block.
pub trait SessionHooks: Send + Sync {
    /// Fired once, before the first header read is armed.
    fn on_connect(&self, session: &SessionHandle) {
        let _ = session;
    }

    /// Fired once, after the stream is released. `connect` always precedes
    /// `disconnect`; `disconnect` may fire without any frame ever arriving.
    fn on_disconnect(&self, session: &SessionHandle, reason: &DisconnectReason) {
        let _ = (session, reason);
    }
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}

/// State shared between the session task, its handle clones, and the drain.
struct SessionShared {
    id: ConnectionId,
    /// Outbound FIFO of fully-encoded frames. Unbounded by design; the
    /// lock is never held across an await point.
    queue: Mutex<VecDeque<Vec<u8>>>,
    /// Single-writer flag: true while a drain owns the write side.
    writing: AtomicBool,
    /// Liveness flag; set exactly once.
    closed: AtomicBool,
    /// Write half of the stream. Taken out (and shut down) at teardown.
    writer: tokio::sync::Mutex<Option<BoxWriter>>,
    /// First terminal cause recorded wins.
    reason: Mutex<Option<DisconnectReason>>,
    /// Signals the read loop that `close()` was called.
    shutdown_tx: watch::Sender<bool>,
}

/// Lock a std mutex, recovering the guard if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionShared {
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.shutdown_tx.send(true);
        }
    }

    fn close_with(&self, reason: DisconnectReason) {
        {
            let mut slot = lock(&self.reason);
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.close();
    }
}

/// Cloneable, thread-safe handle to a live session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// The session's unique connection id.
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Whether the session has entered its terminal state.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Encode `body` under `opcode` and enqueue the frame.
    ///
    /// Fails with [`FrameError::FrameTooLarge`] before anything is enqueued
    /// if the frame would exceed the protocol cap.
    pub fn send(&self, opcode: u16, body: &[u8]) -> Result<(), FrameError> {
        let frame = framing::encode_frame(opcode, body)?;
        self.send_frame(frame);
        Ok(())
    }

    /// Enqueue a fully-encoded frame (length prefix included).
    ///
    /// Never blocks. Frames reach the wire in strict enqueue order. Frames
    /// enqueued on a closed session are silently discarded.
    pub fn send_frame(&self, frame: Vec<u8>) {
        if self.is_closed() {
            tracing::trace!(id = ?self.id(), "send on closed session, frame dropped");
            return;
        }
        lock(&self.shared.queue).push_back(frame);
        self.spawn_drain_if_idle();
    }

    /// The acquire side of the single-writer handoff: claim the writing
    /// state if nobody holds it, otherwise the in-progress drain will pick
    /// up the entry just enqueued.
    fn spawn_drain_if_idle(&self) {
        if self
            .shared
            .writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }
    }

    /// Tear the session down. Idempotent; safe to call concurrently with
    /// in-flight reads and writes from any task.
    pub fn close(&self) {
        self.shared.close();
    }
}

/// Write-drain loop. Exactly one drain runs per session at any instant,
/// guaranteed by the `writing` flag.
async fn drain(shared: Arc<SessionShared>) {
    loop {
        let next = lock(&shared.queue).pop_front();
        let Some(frame) = next else {
            // Release, then re-check: an enqueue may have landed between
            // the empty pop and the release and seen the flag still set.
            shared.writing.store(false, Ordering::Release);
            let empty = lock(&shared.queue).is_empty();
            if empty
                || shared
                    .writing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                return;
            }
            continue;
        };

        let mut slot = shared.writer.lock().await;
        let Some(writer) = slot.as_mut() else {
            // Teardown already took the stream; remaining entries die here.
            shared.writing.store(false, Ordering::Release);
            return;
        };
        let result = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;
        drop(slot);

        if let Err(err) = result {
            shared.writing.store(false, Ordering::Release);
            tracing::debug!(id = ?shared.id, error = %err, "write failed");
            shared.close_with(DisconnectReason::Io(err.kind()));
            return;
        }
    }
}

/// Read `buf.len()` bytes, or stop early if `close()` was signalled.
async fn read_exact_or_close(
    reader: &mut BoxReader,
    shutdown_rx: &mut watch::Receiver<bool>,
    buf: &mut [u8],
) -> Result<(), DisconnectReason> {
    loop {
        tokio::select! {
            result = reader.read_exact(buf) => {
                return match result {
                    Ok(_) => Ok(()),
                    Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                        Err(DisconnectReason::PeerClosed)
                    }
                    Err(err) => Err(DisconnectReason::Io(err.kind())),
                };
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return Err(DisconnectReason::LocalClose);
                }
            }
        }
    }
}

/// One accepted connection: owns the read half and drives the frame loop.
pub struct Session {
    handle: SessionHandle,
    reader: BoxReader,
    shutdown_rx: watch::Receiver<bool>,
    registry: Arc<DispatchRegistry>,
    hooks: Arc<dyn SessionHooks>,
}

impl Session {
    /// Build a session over the two halves of an accepted duplex stream.
    pub fn new(
        id: ConnectionId,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        registry: Arc<DispatchRegistry>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(SessionShared {
            id,
            queue: Mutex::new(VecDeque::new()),
            writing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            writer: tokio::sync::Mutex::new(Some(Box::new(writer) as BoxWriter)),
            reason: Mutex::new(None),
            shutdown_tx,
        });
        Self {
            handle: SessionHandle { shared },
            reader: Box::new(reader),
            shutdown_rx,
            registry,
            hooks,
        }
    }

    /// A handle for sending to and closing this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Run the session to completion.
    ///
    /// Fires `on_connect`, loops header read → body read → dispatch until a
    /// terminal condition, then tears down through the single disconnect
    /// path. Must be called exactly once; consumes the session.
    pub async fn run(mut self) {
        self.hooks.on_connect(&self.handle);
        let reason = self.read_loop().await;
        self.teardown(reason).await;
    }

    async fn read_loop(&mut self) -> DisconnectReason {
        loop {
            // Awaiting header: exactly 2 bytes.
            let mut header = [0u8; LENGTH_PREFIX_SIZE];
            if let Err(reason) =
                read_exact_or_close(&mut self.reader, &mut self.shutdown_rx, &mut header).await
            {
                return reason;
            }

            let declared = framing::decode_header(header);
            if !framing::is_valid_length(declared) {
                tracing::warn!(id = ?self.handle.id(), declared, "frame length out of bounds");
                return DisconnectReason::ProtocolViolation { declared };
            }

            // Awaiting body: exactly `declared` bytes. The bounds check
            // above caps this allocation at MAX_FRAME_SIZE.
            let mut payload = vec![0u8; declared as usize];
            if let Err(reason) =
                read_exact_or_close(&mut self.reader, &mut self.shutdown_rx, &mut payload).await
            {
                return reason;
            }

            let (opcode, body) = match framing::split_payload(&payload) {
                Ok(split) => split,
                Err(_) => {
                    tracing::warn!(id = ?self.handle.id(), declared, "frame too short for opcode");
                    return DisconnectReason::ProtocolViolation { declared };
                }
            };

            tracing::trace!(id = ?self.handle.id(), opcode, len = declared, "frame received");

            match self.registry.dispatch(&self.handle, opcode, body) {
                DispatchOutcome::Handled | DispatchOutcome::UnknownOpcode => {}
                DispatchOutcome::DecodeFailed => {
                    return DisconnectReason::DecodeFailure { opcode };
                }
            }

            // A handler may have closed the session; do not re-arm the read.
            if self.handle.is_closed() {
                return DisconnectReason::LocalClose;
            }
        }
    }

    /// The single disconnect path.
    async fn teardown(self, fallback: DisconnectReason) {
        let Session { handle, hooks, .. } = self;

        handle.shared.close();
        // The first recorded terminal cause wins: a write error may have
        // closed the session while the read loop was parked.
        let reason = lock(&handle.shared.reason).take().unwrap_or(fallback);

        // Take the stream away from the drain and discard pending entries;
        // there is no delivery guarantee past the connection's lifetime.
        let mut slot = handle.shared.writer.lock().await;
        if let Some(mut writer) = slot.take() {
            let _ = writer.shutdown().await;
        }
        drop(slot);
        lock(&handle.shared.queue).clear();

        tracing::debug!(id = ?handle.id(), %reason, "session closed");
        hooks.on_disconnect(&handle, &reason);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A handle backed by an in-memory stream, for tests that exercise
    /// dispatch without a running session task.
    pub fn detached_handle() -> SessionHandle {
        let (_peer, local) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(local);
        let session = Session::new(
            ConnectionId(0),
            reader,
            writer,
            Arc::new(DispatchRegistry::new()),
            Arc::new(NoopHooks),
        );
        session.handle()
    }
}

//! Accept loop and connection bookkeeping for the game-server front end.
//!
//! The [`Gateway`] accepts TCP connections, assigns each a unique
//! [`ConnectionId`], and hands the stream to a freshly constructed
//! [`Session`]. After handoff the session owns its own lifecycle: shutting
//! the gateway down stops the accept loop but never force-closes sessions
//! already handed off.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch};

use crate::dispatch::DispatchRegistry;
use crate::session::{Session, SessionHandle, SessionHooks};

/// Unique identifier for an accepted connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the session map is at capacity.
#[derive(Debug)]
pub struct CapacityReached;

/// Thread-safe map of live session handles keyed by [`ConnectionId`].
pub struct SessionMap {
    inner: RwLock<HashMap<ConnectionId, SessionHandle>>,
    max_sessions: usize,
}

impl SessionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Insert a session handle. Returns `Err` if the map is at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        handle: SessionHandle,
    ) -> Result<(), CapacityReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_sessions {
            return Err(CapacityReached);
        }
        map.insert(id, handle);
        Ok(())
    }

    /// Remove a session by ID.
    pub async fn remove(&self, id: &ConnectionId) -> Option<SessionHandle> {
        self.inner.write().await.remove(id)
    }

    /// Look up a live session's handle.
    pub async fn get(&self, id: &ConnectionId) -> Option<SessionHandle> {
        self.inner.read().await.get(id).cloned()
    }

    /// Return the number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Configuration for [`Gateway`].
pub struct GatewayConfig {
    /// Address to bind to. Default: `0.0.0.0:3000`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent sessions. Default: 256.
    pub max_connections: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 256,
        }
    }
}

/// TCP front end: accepts connections and constructs their sessions.
pub struct Gateway {
    config: GatewayConfig,
    /// Live session handles (public for broadcast and test inspection).
    pub sessions: Arc<SessionMap>,
    id_gen: Arc<IdGenerator>,
    registry: Arc<DispatchRegistry>,
    hooks: Arc<dyn SessionHooks>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Gateway {
    /// Create a new gateway over a startup-populated dispatch registry.
    pub fn new(
        config: GatewayConfig,
        registry: Arc<DispatchRegistry>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            sessions: Arc::new(SessionMap::new(config.max_connections)),
            id_gen: Arc::new(IdGenerator::new()),
            config,
            registry,
            hooks,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = result?;
                    stream.set_nodelay(true)?;

                    let id = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();
                    let session = Session::new(
                        id,
                        reader,
                        writer,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.hooks),
                    );

                    if self.sessions.insert(id, session.handle()).await.is_err() {
                        tracing::warn!("connection limit reached, rejecting {peer_addr}");
                        continue;
                    }

                    tracing::info!("accepted connection {id:?} from {peer_addr}");

                    let sessions = Arc::clone(&self.sessions);
                    tokio::spawn(async move {
                        session.run().await;
                        sessions.remove(&id).await;
                        tracing::info!("connection {id:?} closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("gateway shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Stop accepting new connections. Sessions already handed off keep
    /// running and own their own teardown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

//! # Client Engine
//!
//! The stateful protocol client: connection lifecycle, the two dispatch
//! loops, the send paths, and the application-facing query surface.
//!
//! ## Concurrency shape
//! A live session runs exactly two long-lived tasks. The **read loop**
//! drains the socket, runs automatic handling, and notifies packet
//! observers in wire arrival order. The **command loop** drains the
//! outbound FIFO so queued sends never block their callers and never
//! interleave with each other. Every write, queued or synchronous, goes
//! through one lock-guarded framed writer, which is also what keeps the
//! outbound keystream advancing consistently.
//!
//! `Client` is a cheap handle: clones share the same session.

use crate::config::ClientConfig;
use crate::core::codec::FrameCodec;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::data::ObjectStatus;
use crate::protocol::message::Packet;
use crate::service::handler;
use crate::service::listener::{
    self, ConnectionListener, DataListener, ListenerSet, PacketListener,
};
use crate::service::registry::ObjectRegistry;
use crate::service::session::{ConnectionPhase, SessionRuntime, SharedWriter};
use crate::utils::crypto::SessionKeys;
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, instrument, warn};

/// Handle to one client session.
///
/// A session is single-use: once disconnected (by either side) the handle
/// is spent, and reconnecting takes a fresh `Client`. That rule is what
/// guarantees each connection gets fresh keystreams.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientShared>,
}

struct ClientShared {
    config: ClientConfig,
    keys: SessionKeys,
    phase: Mutex<ConnectionPhase>,
    runtime: Mutex<Option<SessionRuntime>>,
    started: OnceLock<Instant>,
    tick_length_ms: AtomicU32,
    automatic: AtomicBool,
    registry: Mutex<ObjectRegistry>,
    metrics: Metrics,
    packet_listeners: ListenerSet<dyn PacketListener>,
    connection_listeners: ListenerSet<dyn ConnectionListener>,
    data_listeners: ListenerSet<dyn DataListener>,
}

impl Client {
    /// Client with default configuration and the well-known key pair.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default(), SessionKeys::default())
    }

    /// Client with explicit configuration and key material.
    pub fn with_config(config: ClientConfig, keys: SessionKeys) -> Self {
        let automatic = config.automatic_handling;
        Self {
            inner: Arc::new(ClientShared {
                config,
                keys,
                phase: Mutex::new(ConnectionPhase::Idle),
                runtime: Mutex::new(None),
                started: OnceLock::new(),
                tick_length_ms: AtomicU32::new(0),
                automatic: AtomicBool::new(automatic),
                registry: Mutex::new(ObjectRegistry::new()),
                metrics: Metrics::new(),
                packet_listeners: ListenerSet::new(),
                connection_listeners: ListenerSet::new(),
                data_listeners: ListenerSet::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Start connecting to `host` on the configured port and return
    /// immediately; completion or failure is reported to connection
    /// listeners. Valid only on an idle client.
    ///
    /// Must be called from within a Tokio runtime: the dispatch loops are
    /// spawned onto it.
    #[instrument(skip(self))]
    pub fn connect(&self, host: IpAddr) -> Result<()> {
        {
            let mut phase = self
                .inner
                .phase
                .lock()
                .map_err(|_| ProtocolError::Custom(constants::ERR_PHASE_LOCK.to_string()))?;
            if *phase != ConnectionPhase::Idle {
                return Err(ProtocolError::AlreadyConnected);
            }
            *phase = ConnectionPhase::Connecting;
        }

        info!(port = self.inner.config.port, "starting session");
        tokio::spawn(run_session(self.clone(), host));
        Ok(())
    }

    /// Request shutdown of a connected session and return immediately;
    /// the disconnect notification fires once teardown completes. Valid
    /// only while connected: a second call, or a call before/after the
    /// session, is caller misuse.
    pub fn disconnect(&self) -> Result<()> {
        {
            let mut phase = self
                .inner
                .phase
                .lock()
                .map_err(|_| ProtocolError::Custom(constants::ERR_PHASE_LOCK.to_string()))?;
            if *phase != ConnectionPhase::Connected {
                return Err(ProtocolError::NotConnected);
            }
            *phase = ConnectionPhase::Disconnecting;
        }

        let shutdown = {
            let runtime = self
                .inner
                .runtime
                .lock()
                .map_err(|_| ProtocolError::Custom(constants::ERR_RUNTIME_LOCK.to_string()))?;
            runtime.as_ref().map(|rt| Arc::clone(&rt.shutdown))
        };
        if let Some(shutdown) = shutdown {
            shutdown.notify_one();
        }

        info!("disconnect requested");
        Ok(())
    }

    /// Serialize and write one packet on the caller's own execution
    /// context, completing when the bytes are handed to the socket.
    ///
    /// The write itself cannot interleave with queued sends, but ordering
    /// *between* this path and packets already queued via
    /// [`Client::send_async`] is up to the caller.
    pub async fn send_sync(&self, packet: &Packet) -> Result<()> {
        let writer = self.live_writer()?;
        let frame = packet.to_frame()?;
        let wire_len = frame.wire_len();

        writer.lock().await.send(frame).await?;

        self.inner.metrics.packet_sent(wire_len as u64);
        debug!(packet = packet.name(), "sent packet");
        Ok(())
    }

    /// Enqueue one packet for the command loop without blocking. Queued
    /// packets are written in submission order; packets still queued at
    /// disconnect are discarded.
    pub fn send_async(&self, packet: Packet) -> Result<()> {
        self.ensure_connected()?;

        let runtime = self
            .inner
            .runtime
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_RUNTIME_LOCK.to_string()))?;
        match runtime.as_ref() {
            Some(rt) => rt
                .queue_tx
                .send(packet)
                .map_err(|_| ProtocolError::NotConnected),
            None => Err(ProtocolError::NotConnected),
        }
    }

    pub fn add_packet_listener(&self, listener: Arc<dyn PacketListener>) {
        self.inner.packet_listeners.add(listener);
    }

    pub fn remove_packet_listener(&self, listener: &Arc<dyn PacketListener>) -> bool {
        self.inner.packet_listeners.remove(listener)
    }

    pub fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.inner.connection_listeners.add(listener);
    }

    pub fn remove_connection_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.inner.connection_listeners.remove(listener)
    }

    pub fn add_data_listener(&self, listener: Arc<dyn DataListener>) {
        self.inner.data_listeners.add(listener);
    }

    pub fn remove_data_listener(&self, listener: &Arc<dyn DataListener>) -> bool {
        self.inner.data_listeners.remove(listener)
    }

    /// Time since the session started, if it has.
    pub fn elapsed(&self) -> Option<Duration> {
        self.inner.started.get().map(Instant::elapsed)
    }

    /// Elapsed session time in milliseconds, zero before the session
    /// starts. This is the clock echoed in keepalive and movement acks.
    pub fn elapsed_millis(&self) -> u32 {
        self.elapsed().map_or(0, |d| d.as_millis() as u32)
    }

    /// Duration of the last server tick in milliseconds, zero until the
    /// first tick arrives.
    pub fn tick_length_ms(&self) -> u32 {
        self.inner.tick_length_ms.load(Ordering::Relaxed)
    }

    pub fn automatic_handling(&self) -> bool {
        self.inner.automatic.load(Ordering::Relaxed)
    }

    /// Toggle automatic handling mid-session. While off, no acks are sent
    /// and no registry maintenance happens; protocol compliance is the
    /// application's responsibility.
    pub fn set_automatic_handling(&self, enabled: bool) {
        self.inner.automatic.store(enabled, Ordering::Relaxed);
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self
            .inner
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    /// Snapshot of all known entities in insertion order.
    pub fn objects(&self) -> Vec<ObjectStatus> {
        self.with_registry(|reg| reg.objects().to_vec())
    }

    /// The tracked player entity id, once a creation-ack assigned one.
    pub fn player_id(&self) -> Option<u32> {
        self.with_registry(|reg| reg.player_id())
    }

    /// Snapshot of the player's entity, once bound by a world-sync add.
    pub fn player_object(&self) -> Option<ObjectStatus> {
        self.with_registry(|reg| reg.player_object().cloned())
    }

    /// Counters for this session.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn ensure_connected(&self) -> Result<()> {
        let phase = self
            .inner
            .phase
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_PHASE_LOCK.to_string()))?;
        if *phase != ConnectionPhase::Connected {
            return Err(ProtocolError::NotConnected);
        }
        Ok(())
    }

    fn live_writer(&self) -> Result<SharedWriter> {
        self.ensure_connected()?;
        let runtime = self
            .inner
            .runtime
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_RUNTIME_LOCK.to_string()))?;
        match runtime.as_ref() {
            Some(rt) => Ok(Arc::clone(&rt.writer)),
            None => Err(ProtocolError::NotConnected),
        }
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut ObjectRegistry) -> R) -> R {
        let mut guard = self
            .inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn set_tick_length_ms(&self, ms: u32) {
        self.inner.tick_length_ms.store(ms, Ordering::Relaxed);
    }

    /// Deliver one packet to every registered packet observer that
    /// accepts it, on a snapshot of the current registrations.
    pub(crate) fn notify_packet(&self, packet: &Packet) {
        for l in self.inner.packet_listeners.snapshot() {
            if !self.inner.packet_listeners.contains(&l) {
                continue;
            }
            if listener::invoke("accepts", || l.accepts(packet)) == Some(true) {
                listener::invoke("packet_received", || l.packet_received(self, packet));
            }
        }
    }

    pub(crate) fn notify_connected(&self) {
        for l in self.inner.connection_listeners.snapshot() {
            listener::invoke("connected", || l.connected(self));
        }
    }

    pub(crate) fn notify_disconnected(&self) {
        for l in self.inner.connection_listeners.snapshot() {
            listener::invoke("disconnected", || l.disconnected(self));
        }
    }

    /// Addition round: a returned replacement listener joins the set
    /// immediately, before the next observer runs.
    pub(crate) fn notify_object_added(&self, object: &ObjectStatus) {
        for l in self.inner.data_listeners.snapshot() {
            if !self.inner.data_listeners.contains(&l) {
                continue;
            }
            if let Some(Some(extra)) =
                listener::invoke("object_added", || l.object_added(self, object))
            {
                self.inner.data_listeners.add(extra);
            }
        }
    }

    /// Removal round: observers returning true are unregistered after the
    /// whole snapshot has been notified for this entity.
    pub(crate) fn notify_object_removed(&self, object: &ObjectStatus) {
        let mut unregister = Vec::new();
        for l in self.inner.data_listeners.snapshot() {
            if !self.inner.data_listeners.contains(&l) {
                continue;
            }
            if listener::invoke("object_removed", || l.object_removed(self, object))
                == Some(true)
            {
                unregister.push(l);
            }
        }
        for l in unregister {
            self.inner.data_listeners.remove(&l);
        }
    }

    pub(crate) fn notify_object_updated(&self, object: &ObjectStatus) {
        for l in self.inner.data_listeners.snapshot() {
            if !self.inner.data_listeners.contains(&l) {
                continue;
            }
            listener::invoke("object_updated", || l.object_updated(self, object));
        }
    }

    /// Tear down the session exactly once: stop the command loop, release
    /// the socket, reach the terminal phase, then tell lifecycle
    /// observers. Only the session task calls this.
    fn finish_session(&self) {
        let runtime = self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rt) = runtime {
            rt.command_task.abort();
        }

        {
            let mut phase = self
                .inner
                .phase
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *phase = ConnectionPhase::Disconnected;
        }

        self.inner.metrics.log_metrics();
        info!("session ended");
        self.notify_disconnected();
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("phase", &self.phase())
            .field("port", &self.inner.config.port)
            .finish_non_exhaustive()
    }
}

/// Session task spawned by [`Client::connect`]: performs the TCP connect,
/// wires up both loops, then runs the read loop to completion.
async fn run_session(client: Client, host: IpAddr) {
    let addr = SocketAddr::new(host, client.inner.config.port);

    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(%addr, error = %e, "connect failed");
            client.finish_session();
            return;
        }
    };

    if client.inner.config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
    }

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(
        read_half,
        FrameCodec::new(client.inner.keys.inbound_stream()),
    );
    let writer: SharedWriter = Arc::new(AsyncMutex::new(FramedWrite::new(
        write_half,
        FrameCodec::new(client.inner.keys.outbound_stream()),
    )));

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(Notify::new());
    let command_task = tokio::spawn(command_loop(client.clone(), queue_rx, Arc::clone(&writer)));

    {
        let _ = client.inner.started.set(Instant::now());
        let mut runtime = client
            .inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *runtime = Some(SessionRuntime {
            writer,
            queue_tx: queue_tx.clone(),
            shutdown: Arc::clone(&shutdown),
            command_task,
        });
        let mut phase = client
            .inner
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *phase = ConnectionPhase::Connected;
    }

    info!(%addr, "connected");
    client.notify_connected();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("shutdown requested; leaving read loop");
                break;
            }
            frame = reader.next() => match frame {
                Some(Ok(frame)) => {
                    let wire_len = frame.wire_len();
                    let packet = match Packet::parse(frame.tag, &frame.payload) {
                        Ok(packet) => packet,
                        Err(e) => {
                            client.inner.metrics.decode_error();
                            error!(
                                error = %e,
                                tag = format_args!("0x{:02X}", frame.tag),
                                "unparseable packet; stream is desynced"
                            );
                            break;
                        }
                    };
                    client.inner.metrics.packet_received(wire_len as u64);
                    debug!(packet = packet.name(), "received packet");

                    if client.automatic_handling() {
                        for reply in handler::handle_packet(&client, &packet) {
                            client.inner.metrics.auto_reply();
                            if queue_tx.send(reply).is_err() {
                                warn!("command queue closed; dropping automatic reply");
                            }
                        }
                    }

                    client.notify_packet(&packet);

                    if packet.is_terminal() {
                        info!("terminal packet received; ending session");
                        break;
                    }
                }
                Some(Err(e)) => {
                    client.inner.metrics.decode_error();
                    error!(error = %e, "read loop failed");
                    break;
                }
                None => {
                    info!("server closed the connection");
                    break;
                }
            }
        }
    }

    client.finish_session();
}

/// Command loop: drains the outbound FIFO in submission order. Write
/// failures are logged and skipped; the read loop observes the broken
/// socket and tears the session down.
async fn command_loop(
    client: Client,
    mut queue_rx: mpsc::UnboundedReceiver<Packet>,
    writer: SharedWriter,
) {
    while let Some(packet) = queue_rx.recv().await {
        let frame = match packet.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, packet = packet.name(), "failed to serialize queued packet");
                continue;
            }
        };
        let wire_len = frame.wire_len();

        let result = writer.lock().await.send(frame).await;
        match result {
            Ok(()) => {
                client.inner.metrics.packet_sent(wire_len as u64);
                debug!(packet = packet.name(), "sent queued packet");
            }
            Err(e) => {
                error!(error = %e, packet = packet.name(), "failed to write queued packet");
            }
        }
    }
}

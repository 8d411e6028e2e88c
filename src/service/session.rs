//! # Session State
//!
//! The connection phase machine and the per-session runtime handles.
//!
//! A session is single-use: phases only move forward, and a session that
//! reaches [`ConnectionPhase::Disconnected`] stays there. Reconnecting
//! means building a fresh client, which is also what keeps the cipher
//! keystreams fresh per connection.

use crate::core::codec::FrameCodec;
use crate::protocol::message::Packet;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;

/// Where a session is in its lifecycle.
///
/// `connect` is legal only in `Idle`; `disconnect` only in `Connected`.
/// `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Fresh client, no connection attempt yet
    Idle,
    /// TCP connect in flight
    Connecting,
    /// Live session, loops running
    Connected,
    /// Shutdown requested, teardown pending
    Disconnecting,
    /// Session over; terminal
    Disconnected,
}

/// The one writer every outbound frame goes through. Holding the lock is
/// what keeps sync and queued sends from interleaving bytes on the wire.
pub(crate) type SharedWriter = Arc<Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>>;

/// Handles owned by a live session, created when the connect task has a
/// socket and destroyed exactly once at teardown.
pub(crate) struct SessionRuntime {
    /// Exclusive outbound writer (owns the outbound keystream)
    pub writer: SharedWriter,
    /// Producer side of the command queue
    pub queue_tx: mpsc::UnboundedSender<Packet>,
    /// Signal that unblocks the read loop for shutdown
    pub shutdown: Arc<Notify>,
    /// The command loop task, aborted at teardown
    pub command_task: JoinHandle<()>,
}

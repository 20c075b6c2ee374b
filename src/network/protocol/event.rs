//! Internal events emitted by the UDP protocol state machine.
//!
//! These are consumed by the session layer and translated into the
//! public-facing session events (or, for `Input`, folded into an input queue
//! and never forwarded to the user).

use crate::frame_info::PlayerInput;
use crate::{Config, PlayerHandle};

/// Internal event raised by [`UdpProtocol`](super::UdpProtocol) as it processes
/// incoming traffic and advances its handshake/heartbeat timers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event<T>
where
    T: Config,
{
    /// The session is currently synchronizing with the remote client. It will continue until `count` reaches `total`.
    Synchronizing {
        /// Total sync roundtrips required.
        total: u32,
        /// Completed sync roundtrips so far.
        count: u32,
        /// Total sync requests sent (includes retries due to packet loss).
        total_requests_sent: u32,
        /// Milliseconds elapsed since sync started.
        elapsed_ms: u128,
    },
    /// The session is now synchronized with the remote client.
    Synchronized,
    /// The session has received an input from the remote client. This event will not be forwarded to the user.
    Input {
        /// The decoded input.
        input: PlayerInput<T::Input>,
        /// The player the input belongs to.
        player: PlayerHandle,
    },
    /// The remote client has disconnected.
    Disconnected,
    /// The session has not received packets from the remote client since `disconnect_timeout` ms.
    NetworkInterrupted {
        /// The configured disconnect timeout, in milliseconds.
        disconnect_timeout: u128,
    },
    /// Sent only after a `NetworkInterrupted` event, if communication has resumed.
    NetworkResumed,
    /// Synchronization has timed out. This is only emitted if a sync timeout was configured.
    /// The session will continue trying to sync, but the user may choose to abort.
    SyncTimeout {
        /// Milliseconds elapsed since sync started.
        elapsed_ms: u128,
    },
}

//! Error types for robot links and transport registration.

use sphero_common::protocol::ProtocolError;
use sphero_common::transport::TransportError;
use sphero_shared_memory::StateError;
use thiserror::Error;

/// Failures surfaced by a [`crate::RobotLink`].
///
/// Most of them never leave the link: the heartbeat turns them into a
/// restart request on the kill-switch.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transport rejected an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Inbound frame or payload could not be used.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Shared state rejected a write.
    #[error("shared state error: {0}")]
    State(#[from] StateError),

    /// Device does not expose a characteristic the link requires.
    #[error("missing characteristic {0}")]
    MissingCharacteristic(&'static str),

    /// No transport registered under the requested name.
    #[error("transport '{0}' not registered")]
    TransportNotFound(String),

    /// A transport is already registered under this name.
    #[error("transport '{0}' already registered")]
    TransportExists(String),

    /// A heartbeat precondition did not hold.
    #[error("heartbeat check failed in {phase}: {reason}")]
    Heartbeat {
        phase: crate::heartbeat::LinkPhase,
        reason: &'static str,
    },
}

/// Result alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

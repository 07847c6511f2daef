//! Radio transport contracts.
//!
//! This module defines:
//! - `Connectable`, `NotificationSource`, `CharacteristicWriter` - capability
//!   traits a transport adapter implements
//! - `Transport` - the combination a robot link depends on
//! - `TransportEvent` - asynchronous callbacks delivered over a channel
//! - `TransportError` - failure cases
//! - `TransportFactory` - builds one transport per robot address
//!
//! # Event delivery
//!
//! Operations that complete asynchronously on real hardware (connection,
//! service discovery, notification enablement, writes) return as soon as the
//! request is submitted. Their outcome, and every inbound notification
//! fragment, arrives as a [`TransportEvent`] on the receiver returned by
//! [`NotificationSource::events`].

use crossbeam_channel::Receiver;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Service discovery did not complete.
    #[error("Service resolution failed: {0}")]
    ResolveFailed(String),

    /// Subscribing to a characteristic failed.
    #[error("Enable notifications failed on {characteristic}: {reason}")]
    NotifyFailed {
        characteristic: String,
        reason: String,
    },

    /// Characteristic is not exposed by the device.
    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(String),

    /// Write could not be submitted.
    #[error("Write failed on {characteristic}: {reason}")]
    WriteFailed {
        characteristic: String,
        reason: String,
    },

    /// The transport has been closed.
    #[error("Transport disconnected")]
    Disconnected,
}

/// Asynchronous transport callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    ConnectFailed(String),
    ServicesResolved,
    NotificationsEnabled {
        characteristic: String,
    },
    NotificationsFailed {
        characteristic: String,
        reason: String,
    },
    /// Raw notification fragment.
    ValueUpdated {
        characteristic: String,
        value: Vec<u8>,
    },
    WriteSucceeded {
        characteristic: String,
    },
    WriteFailed {
        characteristic: String,
        reason: String,
    },
    Disconnected,
}

/// Session establishment and discovery.
pub trait Connectable: Send {
    /// Start connecting; completion is reported as an event.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear down the session.
    fn disconnect(&mut self);

    /// UUIDs of every characteristic discovered so far.
    fn characteristics(&self) -> Vec<String>;
}

/// Inbound notification delivery.
pub trait NotificationSource: Send {
    /// Subscribe to value updates on `characteristic`.
    fn enable_notifications(&mut self, characteristic: &str) -> Result<(), TransportError>;

    /// Channel carrying every event of this transport.
    fn events(&self) -> Receiver<TransportEvent>;
}

/// Outbound writes.
pub trait CharacteristicWriter: Send {
    /// Submit a write; its outcome is reported as an event.
    fn write_value(&mut self, characteristic: &str, value: &[u8]) -> Result<(), TransportError>;
}

/// Everything a robot link needs from a transport.
pub trait Transport: Connectable + NotificationSource + CharacteristicWriter {
    /// Adapter identifier (e.g., "simulation").
    fn name(&self) -> &'static str;
}

/// Creates a fresh transport for a robot.
pub trait TransportFactory: Send + Sync {
    fn open(&self, robot: usize, address: &str) -> Result<Box<dyn Transport>, TransportError>;
}

impl<F> TransportFactory for F
where
    F: Fn(usize, &str) -> Result<Box<dyn Transport>, TransportError> + Send + Sync,
{
    fn open(&self, robot: usize, address: &str) -> Result<Box<dyn Transport>, TransportError> {
        self(robot, address)
    }
}

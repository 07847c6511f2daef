//! # Sphero Robot Link
//!
//! Per-robot session runtime: connects through a pluggable transport,
//! wakes and configures the robot, streams its telemetry into the shared
//! state and drives the action handshake.
//!
//! # Module Structure
//!
//! - [`core`] - `RobotLink` struct and run loop
//! - [`heartbeat`] - session phases and heartbeat status
//! - [`sequencer`] - one-in-flight outbound write queue
//! - [`handshake`] - reset-yaw / roll action handshake
//! - [`dispatch`] - inbound message interpretation
//! - [`transport_registry`] - named transport factories
//! - [`drivers`] - transport implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        sphero_link                               │
//! │  ┌─────────────┐  events  ┌──────────────┐  telemetry ┌────────┐ │
//! │  │  Transport  ├─────────►│  RobotLink   ├───────────►│ Shared │ │
//! │  │ (trait obj) │◄─────────┤ (heartbeat)  │◄───────────┤ State  │ │
//! │  └─────────────┘  writes  └──────┬───────┘   action   └────────┘ │
//! │                                  │ kill code                     │
//! │                                  ▼                               │
//! │                           ┌──────────────┐                       │
//! │                           │  KillSwitch  │ (read by supervisor)  │
//! │                           └──────────────┘                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod dispatch;
pub mod drivers;
pub mod error;
pub mod handshake;
pub mod heartbeat;
pub mod sequencer;
pub mod transport_registry;

pub use crate::core::RobotLink;
pub use crate::error::{LinkError, LinkResult};
pub use crate::heartbeat::{HeartbeatStatus, LinkPhase};
pub use crate::transport_registry::TransportRegistry;

//! Sphero Common Library
//!
//! This crate provides shared constants, configuration loading, the robot
//! wire protocol and the transport contracts for all Sphero workspace crates.
//!
//! # Module Structure
//!
//! - [`protocol`] - Frame codec, command catalogue and telemetry decoding
//! - [`transport`] - Capability traits implemented by radio transport adapters
//! - [`config`] - Configuration loading traits and fleet configuration
//! - [`watchdog`] - Kill-switch and supervisor contract
//! - [`consts`] - Workspace-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use sphero_common::protocol::{CommandMessage, FrameDecoder};
//! use sphero_common::config::{ConfigLoader, FleetConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod protocol;
pub mod transport;
pub mod watchdog;

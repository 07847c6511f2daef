//! Simulated robot transport.
//!
//! Runs the robot side of the wire protocol in-process so the full link
//! lifecycle can be exercised without a radio.

mod robot;
mod transport;

pub use robot::{SimulatedRobot, SimulationConfig};
pub use transport::{SimulationFactory, SimulationHandle, SimulationTransport};

/// Registry name of the simulation transport.
pub const TRANSPORT_NAME: &str = "simulation";

//! Transport adapter implementations.
//!
//! - [`simulation`] - in-process robot model for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `Transport` traits from `sphero_common::transport`
//! 3. Register a `TransportFactory` for it in [`register_builtin_transports`]

pub mod simulation;

use crate::error::LinkResult;
use crate::transport_registry::TransportRegistry;
use std::sync::Arc;

/// Register every transport compiled into this crate.
pub fn register_builtin_transports(registry: &mut TransportRegistry) -> LinkResult<()> {
    registry.register(
        simulation::TRANSPORT_NAME,
        Arc::new(simulation::SimulationFactory::default()),
    )
}

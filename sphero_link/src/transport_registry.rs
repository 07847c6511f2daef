//! Registry of transport factories.
//!
//! Constructed at startup, populated via `register()`, and handed to the
//! supervisor. Embedding applications register their radio adapter here
//! next to the built-in simulation transport.

use crate::error::{LinkError, LinkResult};
use sphero_common::transport::TransportFactory;
use std::collections::HashMap;
use std::sync::Arc;

/// Named transport factories.
#[derive(Default)]
pub struct TransportRegistry {
    factories: HashMap<&'static str, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// # Errors
    /// Returns `LinkError::TransportExists` if the name is taken.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: Arc<dyn TransportFactory>,
    ) -> LinkResult<()> {
        if self.factories.contains_key(name) {
            return Err(LinkError::TransportExists(name.to_string()));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Look up a factory by name.
    ///
    /// # Errors
    /// Returns `LinkError::TransportNotFound` if nothing is registered.
    pub fn get(&self, name: &str) -> LinkResult<Arc<dyn TransportFactory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| LinkError::TransportNotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::register_builtin_transports;
    use crate::drivers::simulation::SimulationFactory;

    #[test]
    fn builtin_simulation_is_registered() {
        let mut reg = TransportRegistry::new();
        register_builtin_transports(&mut reg).unwrap();
        assert_eq!(reg.names(), vec!["simulation"]);
        let transport = reg.get("simulation").unwrap().open(0, "AA").unwrap();
        assert_eq!(transport.name(), "simulation");
    }

    #[test]
    fn unknown_transport() {
        let reg = TransportRegistry::new();
        assert!(matches!(reg.get("bluez"), Err(LinkError::TransportNotFound(_))));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = TransportRegistry::new();
        reg.register("sim", Arc::new(SimulationFactory::default())).unwrap();
        assert!(matches!(
            reg.register("sim", Arc::new(SimulationFactory::default())),
            Err(LinkError::TransportExists(_))
        ));
    }
}

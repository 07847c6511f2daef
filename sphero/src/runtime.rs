//! Fleet runtime: wires every concern onto its own thread.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!  sphero-link-N ─►                          ◄─ sphero-camera  (simulate)
//!                 │  Arc<SharedState>        ◄─ sphero-microphone (simulate)
//! sphero-monitor ─►                          │
//!                 └─────┬──────────────▲─────┘
//!                events │              │ lifecycle
//!                       ▼              │
//!         sphero-state-machine ────────┘
//!
//! sphero-supervisor owns the sphero-link-N threads.
//! ```
//!
//! The state lives in a named segment (`[shared_memory]` in the config);
//! client processes reach it with [`SpheroLibrary::attach`].

use crate::error::{SpheroError, SpheroResult};
use crate::facade::SpheroLibrary;
use crate::monitor::SensorMonitor;
use crate::notify::{LogNotifier, Notifier};
use crate::sim_feed::{SimulatedCamera, SimulatedMicrophone};
use crate::state_machine::LifecycleStateMachine;
use crate::supervisor::RobotSupervisor;
use sphero_common::config::FleetConfig;
use sphero_common::transport::TransportFactory;
use sphero_shared_memory::SharedState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info};

/// Startup switches.
#[derive(Default)]
pub struct RuntimeOptions {
    /// Feed the camera and microphone streams with synthetic data.
    pub simulate_sensors: bool,
    /// Alert sink for low batteries; logs JSON when `None`.
    pub notifier: Option<Box<dyn Notifier>>,
}

/// Running fleet.
pub struct SpheroRuntime {
    state: Arc<SharedState>,
    stop: Arc<AtomicBool>,
    threads: Vec<(String, JoinHandle<()>)>,
}

fn spawn_named<F>(
    threads: &mut Vec<(String, JoinHandle<()>)>,
    name: &str,
    stop: &Arc<AtomicBool>,
    body: F,
) -> SpheroResult<()>
where
    F: FnOnce(&AtomicBool) + Send + 'static,
{
    let stop = Arc::clone(stop);
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(&stop))?;
    threads.push((name.to_string(), handle));
    Ok(())
}

impl SpheroRuntime {
    /// Create the named shared segment and start every thread.
    ///
    /// # Errors
    /// Fails on an invalid configuration, when a live process already owns
    /// the segment, or if a thread cannot be spawned.
    pub fn start(
        config: &FleetConfig,
        factory: Arc<dyn TransportFactory>,
        options: RuntimeOptions,
    ) -> SpheroResult<Self> {
        let state = Arc::new(SharedState::create(config)?);
        let writer = state
            .lifecycle_writer()
            .ok_or(SpheroError::LifecycleWriterTaken)?;
        let machine = LifecycleStateMachine::new(writer, state.events());
        let monitor = SensorMonitor::new(Arc::clone(&state));
        let notifier = options.notifier.unwrap_or_else(|| Box::new(LogNotifier));
        let mut supervisor = RobotSupervisor::new(Arc::clone(&state), factory, notifier);

        let mut runtime = Self {
            state: Arc::clone(&state),
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        };
        let stop = Arc::clone(&runtime.stop);
        let threads = &mut runtime.threads;

        spawn_named(threads, "sphero-state-machine", &stop, move |s| machine.run(s))?;
        spawn_named(threads, "sphero-monitor", &stop, move |s| monitor.run(s))?;
        if options.simulate_sensors {
            let camera = SimulatedCamera::new(Arc::clone(&state));
            let mic = SimulatedMicrophone::new(Arc::clone(&state));
            spawn_named(threads, "sphero-camera", &stop, move |s| camera.run(s))?;
            spawn_named(threads, "sphero-microphone", &stop, move |s| mic.run(s))?;
        }
        let started = supervisor.spawn_all(Instant::now());
        spawn_named(threads, "sphero-supervisor", &stop, move |s| supervisor.run(s))?;

        info!(
            robots = state.robot_count(),
            started,
            simulate_sensors = options.simulate_sensors,
            "fleet runtime started"
        );
        Ok(runtime)
    }

    pub fn library(&self) -> SpheroLibrary {
        SpheroLibrary::new(Arc::clone(&self.state))
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Stop every thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop_threads();
        info!("fleet runtime stopped");
    }

    fn stop_threads(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Reverse start order, so the supervisor joins its links first.
        for (name, handle) in self.threads.drain(..).rev() {
            if handle.join().is_err() {
                error!(thread = %name, "thread panicked");
            }
        }
    }
}

impl Drop for SpheroRuntime {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop_threads();
        }
    }
}

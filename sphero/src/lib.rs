//! # Sphero Fleet Runtime
//!
//! Ties the robot links, the shared sensor state and the library facade
//! together.
//!
//! # Module Structure
//!
//! - [`supervisor`] - per-robot link threads and their kill-switches
//! - [`monitor`] - stream warm-up and loss detection
//! - [`state_machine`] - sole writer of the library lifecycle state
//! - [`facade`] - `SpheroLibrary`, the client API
//! - [`notify`] - low-battery alerts
//! - [`sim_feed`] - synthetic camera and microphone
//! - [`logging`] - console and file log setup
//! - [`runtime`] - starts and stops every thread
//!
//! # Lifecycle
//!
//! ```text
//!  Disconnected ──ResetStateVars──► WaitingForSensors ──AllSensorsGo──► Serving
//!       ▲                                  │                              │
//!       └──────────SpheroLost──────────────┴──────────SpheroLost──────────┤
//!                                                                         │
//!                                              LowBattery ◄─BatteriesLow──┘
//!
//!  any ──RgbLost / DepthLost / AudioLost──► Failed (absorbing)
//! ```

pub mod error;
pub mod facade;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod runtime;
pub mod sim_feed;
pub mod state_machine;
pub mod supervisor;

pub use error::{FacadeError, SpheroError, SpheroResult};
pub use facade::{SensorSnapshot, SpheroLibrary, Timestamps};
pub use monitor::{SensorMonitor, WarmupTargets};
pub use notify::{LogNotifier, Notifier};
pub use runtime::{RuntimeOptions, SpheroRuntime};
pub use state_machine::{LifecycleStateMachine, transition};
pub use supervisor::RobotSupervisor;

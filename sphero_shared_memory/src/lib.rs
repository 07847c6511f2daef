//! # Sphero Shared State
//!
//! Fixed-capacity concurrent buffers and scalars shared by every thread of
//! the fleet runtime and by client processes attached to it.
//!
//! ## Architecture Overview
//!
//! ```text
//!                     /dev/shm/sphero_<name>  (memmap2 segment)
//! ┌─────────────┐   write frame    ┌──────────────────────────┐
//! │ Camera      ├─────────────────►│ RgbdRings (one lock)     │
//! └─────────────┘                  ├──────────────────────────┤   snapshot   ┌──────────┐
//! ┌─────────────┐   push chunk     │ AudioBuffer (atomics)    ├─────────────►│ Facade   │
//! │ Microphone  ├─────────────────►├──────────────────────────┤              │ (any     │
//! └─────────────┘                  │ TelemetryHistory × N     │              │ process) │
//! ┌─────────────┐   telemetry      ├──────────────────────────┤   submit     └────┬─────┘
//! │ Robot link  ├─────────────────►│ ActionSlot × N           │◄──────────────────┘
//! └─────────────┘◄─────────────────┤ StreamStats (atomics)    │
//!                  phase advance   │ LifecycleCell            │
//!                                  └──────────────────────────┘
//! ```
//!
//! ## Segments
//!
//! [`SharedState::create`] maps a named file (mode `0600`) and removes it
//! when the state is dropped; [`SharedState::attach`] maps it from another
//! process and reads the fleet configuration back from the segment.
//! [`SharedState::new`] uses a private anonymous mapping with the same
//! layout.
//!
//! ## Concurrency rules
//!
//! - Video and depth write pointers share one pid-owned [`SpinLock`];
//!   readers copy both under a single acquisition. Each robot's telemetry
//!   history has its own lock.
//! - Audio samples, packet counters, timestamps and battery voltages are
//!   per-scalar atomics with a single producer each.
//! - [`ActionSlot`] phases act as the hand-off token between the facade and
//!   the robot link; no lock is taken.
//! - [`LifecycleState`] is written only through the [`LifecycleWriter`],
//!   unique across every attached process.
//! - Lifecycle events stay on an in-process channel of the creating
//!   process.

pub mod action;
pub mod audio;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod lock;
pub mod platform;
pub mod ring;
pub mod segment;
pub mod state;
pub mod stream;
pub mod telemetry;

pub use action::{ActionPhase, ActionSlot};
pub use audio::AudioBuffer;
pub use error::{StateError, StateResult};
pub use layout::Layout;
pub use lifecycle::{LifecycleEvent, LifecycleState, LifecycleWriter};
pub use lock::{SpinGuard, SpinLock};
pub use ring::{FrameRing, RgbdRings, RgbdSnapshot, RingElement};
pub use segment::{Segment, SegmentHeader};
pub use state::SharedState;
pub use stream::{StreamStats, now_micros};
pub use telemetry::TelemetryHistory;

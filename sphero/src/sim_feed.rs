//! Synthetic camera and microphone producers for `--simulate` runs.
//!
//! Stand-ins for the capture devices: each writes noise frames into the
//! shared state at the configured rate, stamping its stream like a real
//! device would.

use rand::Rng;
use sphero_shared_memory::{SharedState, StateResult, now_micros};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// RGB-D camera producing random frames at the capture rate.
#[derive(Debug)]
pub struct SimulatedCamera {
    state: Arc<SharedState>,
    rgb: Vec<u8>,
    depth: Vec<u16>,
    period: Duration,
}

impl SimulatedCamera {
    pub fn new(state: Arc<SharedState>) -> Self {
        let camera = &state.config().camera;
        let rgb = vec![0; camera.rgb_frame_len()];
        let depth = vec![0; camera.depth_frame_len()];
        let period = Duration::from_secs(1) / camera.fps.max(1);
        Self {
            state,
            rgb,
            depth,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Capture one frame pair.
    pub fn capture(&mut self, now_us: u64) -> StateResult<()> {
        let mut rng = rand::thread_rng();
        rng.fill(self.rgb.as_mut_slice());
        for d in &mut self.depth {
            *d = rng.gen_range(300..4000);
        }
        self.state.write_video_frame(&self.rgb, now_us)?;
        self.state.write_depth_frame(&self.depth, now_us)
    }

    pub fn run(mut self, stop: &AtomicBool) {
        info!(period = ?self.period, "simulated camera started");
        run_periodic(self.period, stop, |now_us| self.capture(now_us), "camera");
        info!("simulated camera stopped");
    }
}

/// Microphone producing low-level noise chunks.
#[derive(Debug)]
pub struct SimulatedMicrophone {
    state: Arc<SharedState>,
    chunk: Vec<f32>,
    period: Duration,
}

impl SimulatedMicrophone {
    pub fn new(state: Arc<SharedState>) -> Self {
        let config = state.config();
        let chunk = vec![0.0; config.audio_samples_per_chunk()];
        let period = Duration::from_secs_f64(config.audio.secs_per_sample);
        Self {
            state,
            chunk,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Record one chunk.
    pub fn record(&mut self, now_us: u64) -> StateResult<()> {
        let mut rng = rand::thread_rng();
        for s in &mut self.chunk {
            *s = rng.gen_range(-0.01..0.01);
        }
        self.state.push_audio_chunk(&self.chunk, now_us)
    }

    pub fn run(mut self, stop: &AtomicBool) {
        info!(period = ?self.period, samples = self.chunk.len(), "simulated microphone started");
        run_periodic(self.period, stop, |now_us| self.record(now_us), "microphone");
        info!("simulated microphone stopped");
    }
}

fn run_periodic(
    period: Duration,
    stop: &AtomicBool,
    mut produce: impl FnMut(u64) -> StateResult<()>,
    device: &'static str,
) {
    let mut next = Instant::now();
    while !stop.load(Ordering::Acquire) {
        if let Err(e) = produce(now_micros()) {
            warn!(device, error = %e, "simulated capture failed");
        }
        next += period;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            next = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphero_common::config::FleetConfig;
    use sphero_common::consts::{STREAM_AUDIO, STREAM_DEPTH, STREAM_VIDEO};

    #[test]
    fn producers_stamp_their_streams() {
        let mut config = FleetConfig::default();
        config.camera.rgb_width = 4;
        config.camera.rgb_height = 2;
        config.camera.depth_width = 4;
        config.camera.depth_height = 2;
        let state = Arc::new(SharedState::new(&config).unwrap());

        let mut camera = SimulatedCamera::new(Arc::clone(&state));
        let mut mic = SimulatedMicrophone::new(Arc::clone(&state));
        assert_eq!(camera.period(), Duration::from_secs(1) / 30);
        assert_eq!(mic.period(), Duration::from_millis(50));

        camera.capture(7).unwrap();
        camera.capture(8).unwrap();
        mic.record(9).unwrap();

        let streams = state.streams();
        assert_eq!(streams.count(STREAM_VIDEO), 2);
        assert_eq!(streams.count(STREAM_DEPTH), 2);
        assert_eq!(streams.last_update_us(STREAM_DEPTH), 8);
        assert_eq!(streams.count(STREAM_AUDIO), 1);
        assert_eq!(streams.last_update_us(STREAM_AUDIO), 9);
    }
}

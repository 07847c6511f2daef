//! Spin lock usable across processes.
//!
//! The lock word lives inside a segment and holds the pid of its holder
//! (`0` when free). A waiter that keeps losing checks whether the holder
//! is still alive and takes over the lock of a dead process.

use crate::platform::{current_pid, is_process_alive};
use crate::segment::Shared;
use std::hint::spin_loop;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use tracing::warn;

const SPINS_BEFORE_YIELD: u32 = 64;
const ATTEMPTS_PER_LIVENESS_CHECK: u32 = 4_096;

#[derive(Debug, Default)]
#[repr(transparent)]
pub struct SpinLock(AtomicU32);

// SAFETY: a single `AtomicU32`; zero is the unlocked state.
unsafe impl Shared for SpinLock {}

impl SpinLock {
    pub fn lock(&self) -> SpinGuard<'_> {
        let me = current_pid();
        let mut attempts: u32 = 0;
        loop {
            let holder = match self
                .0
                .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return SpinGuard { lock: self },
                Err(holder) => holder,
            };
            attempts = attempts.wrapping_add(1);
            if attempts < SPINS_BEFORE_YIELD {
                spin_loop();
                continue;
            }
            if attempts % ATTEMPTS_PER_LIVENESS_CHECK == 0
                && holder != 0
                && !is_process_alive(holder)
                && self
                    .0
                    .compare_exchange(holder, me, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                warn!(holder, "took over lock held by dead process");
                return SpinGuard { lock: self };
            }
            thread::yield_now();
        }
    }

    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        self.0
            .compare_exchange(0, current_pid(), Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }

    /// Pid of the current holder.
    pub fn holder(&self) -> Option<u32> {
        Some(self.0.load(Ordering::Relaxed)).filter(|pid| *pid != 0)
    }
}

/// Releases the lock on drop.
#[derive(Debug)]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.0.store(0, Ordering::Release);
    }
}

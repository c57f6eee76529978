use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic controller tick counter with a busy-wait.
///
/// The sequencer never sleeps: waiting for a tick deadline is a spin,
/// because the loop is hard-real-time and a scheduler wakeup would
/// blow the phase budget. Implementations must be allocation-free on
/// both paths.
pub trait TickSource: Send + Sync {
    /// Current tick count.
    fn now(&self) -> u64;

    /// Spin until the counter reaches `target`; returns the tick
    /// observed when the wait ended (at least `target`).
    fn wait_until(&self, target: u64) -> u64;
}

/// Wall-clock ticks at a configurable rate.
pub struct HostTicks {
    origin: Instant,
    ticks_per_sec: u64,
}

impl HostTicks {
    pub fn new(ticks_per_sec: u64) -> Self {
        HostTicks {
            origin: Instant::now(),
            ticks_per_sec,
        }
    }
}

impl TickSource for HostTicks {
    fn now(&self) -> u64 {
        let nanos = self.origin.elapsed().as_nanos();
        (nanos * self.ticks_per_sec as u128 / 1_000_000_000) as u64
    }

    fn wait_until(&self, target: u64) -> u64 {
        loop {
            let now = self.now();
            if now >= target {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}

/// Virtual ticks for deterministic simulation.
///
/// A wait simply advances the counter to its target, so simulated
/// time moves exactly as fast as the sequencer asks it to and every
/// run is reproducible tick for tick. The counter never moves
/// backwards, even with concurrent waiters.
pub struct SimTicks {
    now: AtomicU64,
}

impl SimTicks {
    pub fn new() -> Self {
        SimTicks {
            now: AtomicU64::new(0),
        }
    }

    /// Advance the counter from outside the sequencer, e.g. to model
    /// time passing between calls.
    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl Default for SimTicks {
    fn default() -> Self {
        SimTicks::new()
    }
}

impl TickSource for SimTicks {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn wait_until(&self, target: u64) -> u64 {
        self.now.fetch_max(target, Ordering::SeqCst);
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_wait_jumps_to_target() {
        let ticks = SimTicks::new();
        assert_eq!(ticks.now(), 0);
        assert_eq!(ticks.wait_until(80), 80);
        assert_eq!(ticks.now(), 80);
    }

    #[test]
    fn test_sim_wait_never_goes_backwards() {
        let ticks = SimTicks::new();
        ticks.wait_until(100);
        assert_eq!(ticks.wait_until(50), 100);
        assert_eq!(ticks.now(), 100);
    }

    #[test]
    fn test_sim_advance() {
        let ticks = SimTicks::new();
        ticks.advance(25);
        ticks.advance(25);
        assert_eq!(ticks.now(), 50);
    }

    #[test]
    fn test_host_ticks_monotonic() {
        let ticks = HostTicks::new(1_000_000);
        let a = ticks.now();
        let b = ticks.wait_until(a + 10);
        assert!(b >= a + 10);
        assert!(ticks.now() >= b);
    }
}

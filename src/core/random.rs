// Randomness used by the alarm scheduler.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send {
    /// Uniform index in `0..len`. Callers never pass zero.
    fn pick(&mut self, len: usize) -> usize;

    /// Uniform value in `0..=max`.
    fn drift(&mut self, max: u8) -> u8;
}

#[derive(Debug)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for StdRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }

    fn drift(&mut self, max: u8) -> u8 {
        self.rng.random_range(0..=max)
    }
}

/// Replays queued values; falls back to `0` once a queue runs dry.
/// Picks are reduced modulo `len` and drifts clamped to `max`.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    picks: VecDeque<usize>,
    drifts: VecDeque<u8>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    pub fn with_drifts(mut self, drifts: impl IntoIterator<Item = u8>) -> Self {
        self.drifts.extend(drifts);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.picks.pop_front().unwrap_or(0) % len.max(1)
    }

    fn drift(&mut self, max: u8) -> u8 {
        self.drifts.pop_front().unwrap_or(0).min(max)
    }
}

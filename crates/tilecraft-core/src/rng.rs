//! Deterministic randomness for material spawning and order selection.
//!
//! The engine never reaches for ambient randomness. Every random choice goes
//! through a [`RandomSource`] owned by the engine, so tests can script the
//! sequence and two engines with the same seed replay identically.
//! [`SimRng`] (SplitMix64) is the default source: 8 bytes of state and
//! trivially serializable.

/// A source of uniformly distributed 64-bit values.
///
/// Only [`next_u64`](RandomSource::next_u64) is required; index picking and
/// shuffling are derived from it.
pub trait RandomSource: std::fmt::Debug {
    /// Generate the next `u64` in the sequence.
    fn next_u64(&mut self) -> u64;

    /// Pick an index in `0..len`. Returns `None` for an empty range.
    fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some((self.next_u64() % len as u64) as usize)
    }

    /// Fisher-Yates shuffle in place.
    fn shuffle<T>(&mut self, items: &mut [T])
    where
        Self: Sized,
    {
        for i in (1..items.len()).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            items.swap(i, j);
        }
    }
}

/// SplitMix64 pseudo-random number generator.
///
/// Deterministic across platforms.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Get the internal state (for hashing/serialization).
    pub fn state(&self) -> u64 {
        self.state
    }
}

impl RandomSource for SimRng {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

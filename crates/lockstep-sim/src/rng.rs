//! Deterministic random number generator for simulation logic.
//!
//! xorshift64: identical seeds give identical sequences on every platform,
//! which is what makes the state usable as a desync fingerprint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldRng {
    state: u64,
}

impl WorldRng {
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves the zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    pub fn from_pair([hi, lo]: [u32; 2]) -> Self {
        Self::new(((hi as u64) << 32) | lo as u64)
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// State split as `[high, low]` words.
    pub fn pair(&self) -> [u32; 2] {
        [(self.state >> 32) as u32, self.state as u32]
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Value in `0..bound`; 0 when `bound` is 0.
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.next_u32() % bound
    }
}

impl Default for WorldRng {
    fn default() -> Self {
        Self::new(0x2545_F491_4F6C_DD1D)
    }
}

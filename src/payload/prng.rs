//! Deterministic scheduling CSPRNG.
//!
//! Writer and reader seed an identical ChaCha20 generator from the
//! manifest's payload config and must consume values in the same order;
//! every index draw, padding-length draw, and padding byte comes from
//! this single stream.

use rand::Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::PayloadConfig;
use crate::constants::{PRNG_CHACHA20, PRNG_SEED_LEN};
use crate::types::{PackageError, Result};

pub struct SchedulingPrng {
    rng: ChaCha20Rng,
}

impl SchedulingPrng {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        SchedulingPrng {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    pub fn from_config(cfg: &PayloadConfig) -> Result<Self> {
        if cfg.prng != PRNG_CHACHA20 {
            return Err(PackageError::ConfigInvalid(format!(
                "unknown scheduling PRNG {:?}",
                cfg.prng
            )));
        }
        let seed: [u8; PRNG_SEED_LEN] = cfg
            .prng_config
            .as_slice()
            .try_into()
            .map_err(|_| PackageError::ConfigInvalid("scheduling PRNG seed must be 32 bytes".into()))?;
        Ok(Self::from_seed(seed))
    }

    /// Uniform draw in `[0, n)`. Sampling is done in u32 space so the
    /// consumed stream is identical across platforms.
    pub fn next_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0 && n <= u32::MAX as usize);
        self.rng.gen_range(0..n as u32) as usize
    }

    /// Uniform draw in `[lo, hi]`.
    pub fn next_range(&mut self, lo: u32, hi: u32) -> u32 {
        self.rng.gen_range(lo..=hi)
    }

    pub fn fill(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}

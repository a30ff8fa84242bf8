//! The `random` opcode's number generator.
//!
//! Grounded directly on the original `zrand.rs`'s `ZRand`/`RandMode` shape
//! (a boxed `RngCore` switched between `thread_rng` and a seeded `StdRng`),
//! extended with the reseed behaviour the `random` opcode requires: a
//! negative argument reseeds predictably from its absolute value, zero
//! reseeds to uniform (truly random) mode, and a positive argument draws
//! from `1..=n`.

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandMode {
    Predictable,
    RandomUniform,
}

pub struct ZRand {
    rng: Box<dyn RngCore + Send>,
    rand_mode: RandMode,
}

impl ZRand {
    pub fn new_uniform() -> ZRand {
        ZRand {
            rng: Box::new(rand::thread_rng()),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable,
        }
    }

    pub fn mode(&self) -> RandMode {
        self.rand_mode
    }

    fn reseed_uniform(&mut self) {
        self.rng = Box::new(rand::thread_rng());
        self.rand_mode = RandMode::RandomUniform;
    }

    fn reseed_predictable(&mut self, seed: u64) {
        self.rng = Box::new(StdRng::seed_from_u64(seed));
        self.rand_mode = RandMode::Predictable;
    }

    /// Implements the `random` opcode's full contract: `range < 0` reseeds
    /// predictably from `-range` and returns 0; `range == 0` reseeds to
    /// uniform mode and returns 0; `range > 0` returns a uniform value in
    /// `1..=range`.
    pub fn random_opcode(&mut self, range: i16) -> u16 {
        if range < 0 {
            self.reseed_predictable((-(range as i32)) as u64);
            0
        } else if range == 0 {
            self.reseed_uniform();
            0
        } else {
            self.rng.gen_range(1..=range as u16)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn negative_reseeds_predictable_and_returns_zero() {
        let mut r = ZRand::new_uniform();
        assert_eq!(r.random_opcode(-42), 0);
        assert_eq!(r.mode(), RandMode::Predictable);
    }

    #[test]
    fn zero_reseeds_uniform_and_returns_zero() {
        let mut r = ZRand::new_predictable(7);
        assert_eq!(r.random_opcode(0), 0);
        assert_eq!(r.mode(), RandMode::RandomUniform);
    }

    #[test]
    fn positive_draws_in_range() {
        let mut r = ZRand::new_predictable(1);
        for _ in 0..50 {
            let v = r.random_opcode(10);
            assert!((1..=10).contains(&v));
        }
    }

    #[test]
    fn predictable_seed_is_deterministic() {
        let mut a = ZRand::new_predictable(99);
        let mut b = ZRand::new_predictable(99);
        let seq_a: Vec<u16> = (0..20).map(|_| a.random_opcode(1000)).collect();
        let seq_b: Vec<u16> = (0..20).map(|_| b.random_opcode(1000)).collect();
        assert_eq!(seq_a, seq_b);
    }
}

//! Deterministic pseudo-random generator

use rand::RngCore;

/// Pseudo-random number generator with three seeding modes.
///
/// The default mode is a 64-bit xorshift. A sequential seed puts the
/// generator into a counting mode used by deterministic test scripts. The
/// full 64-bit state survives save and restore verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Random {
    state: u64,
    sequential_limit: u32,
}

impl Default for Random {
    fn default() -> Self {
        let mut random = Self {
            state: 1,
            sequential_limit: 0,
        };
        random.unpredictable_seed();
        random
    }
}

impl Random {
    /// Internal state, for save files.
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Overwrite the internal state, for restores.
    pub fn set_state(&mut self, state: u64) {
        self.state = state;
    }

    /// Seed with a known value; the zero seed is coerced to one.
    pub fn predictable_seed(&mut self, seed: u32) {
        self.state = if seed == 0 { 1 } else { u64::from(seed) };
        self.sequential_limit = 0;
    }

    /// Seed with entropy from the operating system.
    pub fn unpredictable_seed(&mut self) {
        let seed = rand::thread_rng().next_u64();
        self.state = if seed == 0 { 1 } else { seed };
        self.sequential_limit = 0;
    }

    /// Enter counting mode: successive values are 0, 1, .., `limit`-1, 0, ..
    pub fn sequential_seed(&mut self, limit: u32) {
        self.state = 0;
        self.sequential_limit = limit;
    }

    /// Next raw value from the generator.
    pub fn next_value(&mut self) -> u32 {
        if self.sequential_limit != 0 {
            let value = self.state as u32;
            self.state = (self.state + 1) % u64::from(self.sequential_limit);
            value
        } else {
            self.state ^= self.state << 13;
            self.state ^= self.state >> 7;
            self.state ^= self.state << 17;
            self.state as u32
        }
    }

    /// Semantics of the `random` opcode.
    ///
    /// Zero reseeds unpredictably, small negative arguments enter counting
    /// mode, large negative arguments reseed predictably; all three return
    /// zero. A positive argument returns a value in `1..=arg`.
    pub fn random_op(&mut self, arg: i16) -> u16 {
        if arg == 0 {
            self.unpredictable_seed();
            0
        } else if arg < 0 {
            let magnitude = -(i32::from(arg)) as u32;
            if magnitude < 1000 {
                self.sequential_seed(magnitude);
            } else {
                self.predictable_seed(magnitude);
            }
            0
        } else {
            let value = if self.sequential_limit != 0 {
                // The counter is used directly so scripted sequences step
                // 1, 2, .., n rather than collapsing under the shift below.
                self.next_value()
            } else {
                (self.next_value() >> 16) & 0x7FFF
            };
            (value % arg as u32 + 1) as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_one_always_returns_one() {
        let mut random = Random::default();
        for _ in 0..100 {
            assert_eq!(random.random_op(1), 1);
        }
    }

    #[test]
    fn sequential_mode_counts() {
        let mut random = Random::default();
        assert_eq!(random.random_op(-8), 0);
        let drawn: Vec<u16> = (0..18).map(|_| random.random_op(8)).collect();
        let expected: Vec<u16> = (1..=8).chain(1..=8).chain(1..=2).collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn predictable_seed_repeats_sequences() {
        let mut a = Random::default();
        let mut b = Random::default();
        a.random_op(-4242);
        b.random_op(-4242);
        for _ in 0..64 {
            assert_eq!(a.random_op(1000), b.random_op(1000));
        }
    }

    #[test]
    fn predictable_seed_leaves_counting_mode() {
        let mut counting = Random::default();
        counting.random_op(-5);
        counting.random_op(-4242);
        let mut plain = Random::default();
        plain.random_op(-4242);
        // Reseeding must fully leave counting mode behind.
        for _ in 0..16 {
            assert_eq!(counting.random_op(100), plain.random_op(100));
        }
    }

    #[test]
    fn state_round_trips() {
        let mut random = Random::default();
        random.predictable_seed(99);
        random.next_value();
        let saved = random.state();
        let mut restored = Random::default();
        restored.set_state(saved);
        let mut original = random.clone();
        assert_eq!(original.next_value(), restored.next_value());
    }
}

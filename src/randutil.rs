
use rand::Rng;

/// `RandomGenerator` is a source of uniformly distributed integers used to
/// pick candidate relay ports.
pub trait RandomGenerator {
    /// Returns a uniform integer in `[0, n)`. `n` must be greater than 0.
    fn intn(&self, n: u32) -> u32;
}

/// `MathRandomGenerator` draws from the thread-local generator of `rand`.
#[derive(Default, Debug, Clone, Copy)]
pub struct MathRandomGenerator;

impl MathRandomGenerator {
    pub fn new() -> Self {
        MathRandomGenerator
    }
}

impl RandomGenerator for MathRandomGenerator {
    fn intn(&self, n: u32) -> u32 {
        rand::rng().random_range(0..n)
    }
}

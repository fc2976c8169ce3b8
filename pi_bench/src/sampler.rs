use rand::distributions::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Aggregate outcome of one batch. Individual points are never kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleBatchResult {
    pub inside_count: u64,
    pub total_count: u64,
}

impl SampleBatchResult {
    pub const EMPTY: SampleBatchResult = SampleBatchResult {
        inside_count: 0,
        total_count: 0,
    };

    /// Returns `None` if `inside_count > total_count`.
    pub fn new(inside_count: u64, total_count: u64) -> Option<Self> {
        (inside_count <= total_count).then_some(SampleBatchResult {
            inside_count,
            total_count,
        })
    }
}

/// Anything a worker unit can pull batches from.
pub trait BatchSource: Send + 'static {
    fn sample(&mut self, batch_size: u64) -> SampleBatchResult;
}

/// Draws `batch_size` points uniformly from [-1, 1]² and counts those on or
/// inside the unit circle.
pub fn sample_batch<R: Rng + ?Sized>(rng: &mut R, batch_size: u64) -> SampleBatchResult {
    let side = Uniform::new_inclusive(-1.0f64, 1.0);
    let mut inside = 0;

    for _ in 0..batch_size {
        let x = side.sample(rng);
        let y = side.sample(rng);
        if x * x + y * y <= 1.0 {
            inside += 1;
        }
    }

    SampleBatchResult {
        inside_count: inside,
        total_count: batch_size,
    }
}

pub struct Sampler {
    rng: SmallRng,
}

impl Sampler {
    pub fn from_entropy() -> Self {
        Sampler {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Sampler {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl BatchSource for Sampler {
    fn sample(&mut self, batch_size: u64) -> SampleBatchResult {
        sample_batch(&mut self.rng, batch_size)
    }
}

use thiserror::Error;

/// Preconditions a caller violated when asking for a weighted sample.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample size {requested} exceeds population size {available}")]
    TooManyRequested { requested: usize, available: usize },
    #[error("weight at index {index} must be positive, got {weight}")]
    NonPositiveWeight { index: usize, weight: String },
}

/// A small, fast, splittable PRNG — not cryptographic, but deterministic
/// given a seed, which is all match prioritization needs to make sampling
/// reproducible across runs.
#[derive(Clone, Debug)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        SplitMix64 { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    /// A uniform sample in `(0, 1]`, never exactly `0` (so `1/weight`-style
    /// exponents and logarithms stay finite).
    pub fn next_open01(&mut self) -> f64 {
        let bits = self.next_u64() >> 11;
        ((bits as f64) + 1.0) / ((1u64 << 53) as f64 + 1.0)
    }
}

/// Efraimidis–Spirakis weighted reservoir sampling without replacement:
/// assigns each element a key `u_i^(1/w_i)` for `u_i ~ U(0,1)` and keeps the
/// `n` largest keys. `n = 0` returns nothing; `n >= elems.len()` returns
/// every element (in its original relative order, since no order is implied
/// by sampling alone once everything is kept).
pub fn sample_without_replacement<T: Clone>(
    elems: &[T],
    weights: &[f64],
    n: usize,
    rng: &mut SplitMix64,
) -> Result<Vec<T>, SampleError> {
    assert_eq!(elems.len(), weights.len(), "weights must match elems 1:1");
    for (index, &weight) in weights.iter().enumerate() {
        if !(weight > 0.0) {
            return Err(SampleError::NonPositiveWeight {
                index,
                weight: weight.to_string(),
            });
        }
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    if n >= elems.len() {
        return Ok(elems.to_vec());
    }

    let mut keyed: Vec<(f64, usize)> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let u = rng.next_open01();
            (u.powf(1.0 / w), i)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    keyed.truncate(n);
    keyed.sort_by_key(|&(_, i)| i);
    Ok(keyed.into_iter().map(|(_, i)| elems[i].clone()).collect())
}

/// A linear congruential generator kept only for the legacy sampling path
/// some callers still depend on for bit-identical output against older
/// recorded traces. New code should use [`SplitMix64`] with
/// [`sample_without_replacement`] instead.
#[derive(Clone, Debug)]
pub struct LcgRandomSampling {
    state: u64,
}

const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

impl LcgRandomSampling {
    pub fn new(seed: u64) -> Self {
        LcgRandomSampling { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        (self.state >> 32) as u32
    }

    /// Uniform, unweighted sampling without replacement via partial
    /// Fisher-Yates. Unlike [`sample_without_replacement`], every element
    /// has equal odds of selection regardless of priority.
    pub fn sample<T: Clone>(&mut self, elems: &[T], n: usize) -> Result<Vec<T>, SampleError> {
        if n > elems.len() {
            return Err(SampleError::TooManyRequested {
                requested: n,
                available: elems.len(),
            });
        }
        let mut pool: Vec<usize> = (0..elems.len()).collect();
        let mut chosen = Vec::with_capacity(n);
        for _ in 0..n {
            let remaining = pool.len() as u32;
            let pick = (self.next_u32() % remaining) as usize;
            chosen.push(pool.swap_remove(pick));
        }
        chosen.sort_unstable();
        Ok(chosen.into_iter().map(|i| elems[i].clone()).collect())
    }
}

/// Assigns a priority to each match before application. Higher priority
/// means "apply sooner / more likely to be sampled", the knob between
/// exhaustive and best-effort saturation.
pub trait Prioritizer<M> {
    fn priority(&self, matches: &[M]) -> Vec<u32>;
}

/// Every match gets priority 1; a batch cap is enforced by the caller after
/// sorting, not by this prioritizer itself — it only ever assigns, never
/// drops.
#[derive(Clone, Copy, Debug)]
pub struct UniformPriorities {
    pub max_batch: usize,
}

impl UniformPriorities {
    pub fn new(max_batch: usize) -> Self {
        UniformPriorities { max_batch }
    }

    /// Truncates `matches` to at most `max_batch` entries, all carrying
    /// priority 1.
    pub fn apply<M: Clone>(&self, matches: &[M]) -> Vec<M> {
        matches.iter().take(self.max_batch).cloned().collect()
    }
}

impl<M> Prioritizer<M> for UniformPriorities {
    fn priority(&self, matches: &[M]) -> Vec<u32> {
        vec![1; matches.len()]
    }
}

/// Wraps an underlying prioritizer and re-weights its output through a
/// caller-supplied function of `(index, underlying priority)`. Used to layer
/// e.g. a recency or cost bias on top of a base scheme without re-deriving
/// it.
pub struct ReweightedPriorities<M> {
    inner: Box<dyn Prioritizer<M>>,
    reweight: Box<dyn Fn(usize, u32) -> u32>,
}

impl<M> ReweightedPriorities<M> {
    pub fn new(inner: Box<dyn Prioritizer<M>>, reweight: Box<dyn Fn(usize, u32) -> u32>) -> Self {
        ReweightedPriorities { inner, reweight }
    }
}

impl<M> Prioritizer<M> for ReweightedPriorities<M> {
    fn priority(&self, matches: &[M]) -> Vec<u32> {
        self.inner
            .priority(matches)
            .into_iter()
            .enumerate()
            .map(|(i, p)| (self.reweight)(i, p))
            .collect()
    }
}

/// Re-weights an underlying prioritizer's output through a curve sampled at
/// each index, rather than a closure over `(index, priority)` pairs —
/// useful when the shape of the curve is itself data (e.g. fit from a
/// previous run's acceptance rates).
pub struct CurveFittedPriorities<M> {
    inner: Box<dyn Prioritizer<M>>,
    curve: Box<dyn Fn(usize) -> f64>,
}

impl<M> CurveFittedPriorities<M> {
    pub fn new(inner: Box<dyn Prioritizer<M>>, curve: Box<dyn Fn(usize) -> f64>) -> Self {
        CurveFittedPriorities { inner, curve }
    }
}

impl<M> Prioritizer<M> for CurveFittedPriorities<M> {
    fn priority(&self, matches: &[M]) -> Vec<u32> {
        self.inner
            .priority(matches)
            .into_iter()
            .enumerate()
            .map(|(i, p)| ((p as f64) * (self.curve)(i)).round().max(0.0) as u32)
            .collect()
    }
}

/// Converts a list of priorities (descending significance, not necessarily
/// descending value) into a probability distribution over the same
/// indices: groups equal-priority runs, assigns each group the mean of
/// `weight_fn(i)` over its index range, then spreads whatever mass is left
/// over (from rounding, or an empty input) uniformly so the result sums to
/// exactly 1.
pub fn priorities_to_probabilities(
    priorities: &[u32],
    weight_fn: impl Fn(usize) -> f64,
) -> Vec<f64> {
    let n = priorities.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| priorities[b].cmp(&priorities[a]));

    let mut probs = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && priorities[order[j]] == priorities[order[i]] {
            j += 1;
        }
        let group_mean: f64 = (i..j).map(&weight_fn).sum::<f64>() / ((j - i) as f64);
        for &idx in &order[i..j] {
            probs[idx] = group_mean;
        }
        i = j;
    }

    let total: f64 = probs.iter().sum();
    if total <= 0.0 {
        let uniform = 1.0 / (n as f64);
        return vec![uniform; n];
    }
    for p in probs.iter_mut() {
        *p /= total;
    }
    probs
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// For any list of priorities, of any length, the resulting
        /// distribution always sums to 1 and never goes negative — the two
        /// properties every caller downstream (sampling, prioritized match
        /// selection) relies on without re-checking.
        #[test]
        fn distribution_is_always_normalized_and_nonnegative(priorities in prop::collection::vec(0u32..20, 0..40)) {
            let probs = priorities_to_probabilities(&priorities, |i| (i + 1) as f64);
            prop_assert_eq!(probs.len(), priorities.len());
            if !probs.is_empty() {
                let sum: f64 = probs.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
            }
            for &p in &probs {
                prop_assert!(p >= 0.0, "probability {} was negative", p);
            }
        }

        /// Indices sharing a priority value always land on the same
        /// probability, regardless of how the groups are interleaved.
        #[test]
        fn equal_priorities_always_share_a_probability(priorities in prop::collection::vec(0u32..4, 1..12)) {
            let probs = priorities_to_probabilities(&priorities, |i| (i + 1) as f64);
            for i in 0..priorities.len() {
                for j in (i + 1)..priorities.len() {
                    if priorities[i] == priorities[j] {
                        prop_assert!((probs[i] - probs[j]).abs() < 1e-6);
                    }
                }
            }
        }
    }
}

/// Runs a function over a batch of inputs, possibly in parallel, preserving
/// input order in the result. All user-facing engine operations run on a
/// single driver thread; this is the only seam where work is allowed to fan
/// out across threads, and only for pure, read-only computation over a
/// snapshot (never a mutable e-graph).
pub trait ParallelMap {
    fn apply<T, R, F>(&self, inputs: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync;
}

/// Maps on the calling thread. The default for small inputs or when
/// determinism under a debugger/single-threaded test harness matters more
/// than throughput.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl ParallelMap for Sequential {
    fn apply<T, R, F>(&self, inputs: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        inputs.into_iter().map(f).collect()
    }
}

/// Maps across a fixed-size `rayon` thread pool. Built once per
/// `FixedThreadParallel` value (pool construction is not free), then reused
/// across every `apply` call.
pub struct FixedThreadParallel {
    pool: rayon::ThreadPool,
}

impl FixedThreadParallel {
    pub fn new(num_threads: usize) -> Result<FixedThreadParallel, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(FixedThreadParallel { pool })
    }
}

impl ParallelMap for FixedThreadParallel {
    fn apply<T, R, F>(&self, inputs: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        use rayon::prelude::*;
        self.pool
            .install(|| inputs.into_par_iter().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_preserves_order() {
        let out = Sequential.apply(vec![1, 2, 3], |x| x * 10);
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn fixed_thread_preserves_order() {
        let pool = FixedThreadParallel::new(4).unwrap();
        let out = pool.apply((0..64).collect(), |x: i32| x * 2);
        let expected: Vec<i32> = (0..64).map(|x| x * 2).collect();
        assert_eq!(out, expected);
    }
}

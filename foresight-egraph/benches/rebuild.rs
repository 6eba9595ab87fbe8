use criterion::{criterion_group, criterion_main, Criterion};
use foresight_egraph::{ENode, MutEGraph};

/// Builds a chain of `n` binary nodes, each unioned with a fresh leaf, then
/// times the worklist-draining `rebuild` that restores congruence.
fn chain_rebuild(c: &mut Criterion) {
    c.bench_function("rebuild chain of 256 unions", |b| {
        b.iter(|| {
            let mut egraph = MutEGraph::<&'static str>::empty();
            let mut prev = egraph.add(ENode::leaf("zero"));
            let mut calls = Vec::with_capacity(256);
            for _ in 0..256 {
                let next =
                    egraph.add(ENode::new("succ", vec![], vec![], vec![prev.clone()]).unwrap());
                calls.push(next.clone());
                prev = next;
            }
            for pair in calls.windows(2) {
                egraph.union(pair[0].class, pair[1].class);
            }
            egraph.rebuild();
        })
    });
}

criterion_group!(benches, chain_rebuild);
criterion_main!(benches);

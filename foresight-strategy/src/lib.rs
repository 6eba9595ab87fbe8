#![deny(unsafe_code)]

//! Strategy combinators, match prioritization, sampling and cost-directed
//! extraction layered on top of `foresight-egraph` and `foresight-pattern`.

mod cost;
mod metadata;
mod parallel;
mod priority;
mod sample;
mod strategy;

pub use cost::{extract, CostFunction, ExtractedTree, ExtractionAnalysis};
pub use metadata::{reanalyze, AddAnalysis, DropData};
pub use parallel::{FixedThreadParallel, ParallelMap, Sequential};
pub use priority::{
    priorities_to_probabilities, CurveFittedPriorities, Prioritizer, ReweightedPriorities,
    UniformPriorities,
};
pub use sample::{sample_without_replacement, LcgRandomSampling, SampleError, SplitMix64};
pub use strategy::{
    MaximalRuleApplication, MaximalRuleApplicationWithCaching, Repeat, RuleApplicationCache,
    Strategy,
};

macro_rules! trace {
    ($($arg:tt)*) => {
        if cfg!(feature = "trace-log") {
            log::trace!($($arg)*);
        }
    };
}
pub(crate) use trace;

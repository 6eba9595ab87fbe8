#![deny(unsafe_code)]

//! Foresight: equality saturation over slotted, hash-consed e-graphs.
//!
//! This crate is a thin re-export of the four crates that actually
//! implement the engine — `foresight-slots`, `foresight-egraph`,
//! `foresight-pattern` and `foresight-strategy` — split apart so that a
//! client embedding only the core data structure (say, inside a compiler
//! that brings its own pattern matcher) can depend on `foresight-egraph`
//! alone.

pub use foresight_slots::{Slot, SlotMap, SlotSet};

pub use foresight_egraph::{
    Analysis, EClassCall, EClassRef, EGraph, EGraphError, EGraphWithPendingUnions, ENode,
    MixedTree, MutEGraph, NoAnalysis, NodeOp, PairAnalysis, ShapeCall,
};

pub use foresight_pattern::{
    compile, AggregateSearcher, Applier, Command, CommandQueue, FilteredApplier,
    FilteredSearcher, Instruction, MachineSearcherPhase, Pattern, PatternApplier, PatternMatch,
    PatternVar, Program, RootedMatch, Rule, Searcher, SubstituteApplier, UnionTarget,
};

pub use foresight_strategy::{
    extract, priorities_to_probabilities, reanalyze, sample_without_replacement, AddAnalysis,
    CostFunction, CurveFittedPriorities, DropData, ExtractedTree, ExtractionAnalysis,
    FixedThreadParallel, LcgRandomSampling, MaximalRuleApplication,
    MaximalRuleApplicationWithCaching, ParallelMap, Prioritizer, Repeat, ReweightedPriorities,
    RuleApplicationCache, SampleError, Sequential, SplitMix64, Strategy, UniformPriorities,
};

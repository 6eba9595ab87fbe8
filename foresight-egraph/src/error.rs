use crate::EClassRef;

/// Precondition violations surfaced to callers as
/// ordinary, fatal `Result::Err`s. None of these can arise from internal
/// engine state alone — they all originate from a caller passing the
/// engine something it documented as invalid — so none of them corrupt
/// e-graph state: the check always happens before any mutation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EGraphError {
    #[error("e-node defs and uses overlap on slot {0:?}")]
    DefsUsesOverlap(foresight_slots::Slot),
    #[error("no such e-class: {0:?}")]
    NoSuchClass(EClassRef),
}

//! Quorum evaluation for one observe round
//!
//! Pure: a round's samples plus the requirement decide the outcome.

use super::status::{ObserveStatus, PersistTo, ReplicateTo};

/// One node's answer in an observe round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveSample {
    pub node: String,
    pub master: bool,
    pub status: ObserveStatus,
}

/// Which key states count as persisted and as replicated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIdentifiers {
    pub persisted: ObserveStatus,
    pub replicated: ObserveStatus,
}

impl StatusIdentifiers {
    /// Stores look for the document, removals for its absence.
    ///
    /// A store is durable once nodes report `Found*`; a removal once they
    /// report `NotFound*`. These pairs must not be swapped.
    pub fn for_mutation(removed: bool) -> Self {
        if removed {
            Self {
                persisted: ObserveStatus::NotFoundPersisted,
                replicated: ObserveStatus::NotFoundNotPersisted,
            }
        } else {
            Self {
                persisted: ObserveStatus::FoundPersisted,
                replicated: ObserveStatus::FoundNotPersisted,
            }
        }
    }
}

/// Counts from one round and whether each requirement holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuorumState {
    pub persisted: usize,
    pub replicated: usize,
    pub master_persisted: bool,
    pub persist_done: bool,
    pub replicate_done: bool,
}

impl QuorumState {
    pub fn is_satisfied(&self) -> bool {
        self.persist_done && self.replicate_done
    }
}

/// Evaluate one round.
///
/// The master only ever counts towards persistence. A replica that has
/// persisted counts as both persisted and replicated.
pub fn evaluate(
    samples: &[ObserveSample],
    identifiers: StatusIdentifiers,
    persist_to: PersistTo,
    replicate_to: ReplicateTo,
) -> QuorumState {
    let mut state = QuorumState::default();

    for sample in samples {
        if sample.master {
            if sample.status == identifiers.persisted {
                state.persisted += 1;
                state.master_persisted = true;
            }
        } else if sample.status == identifiers.persisted {
            state.persisted += 1;
            state.replicated += 1;
        } else if sample.status == identifiers.replicated {
            state.replicated += 1;
        }
    }

    state.persist_done = match persist_to {
        PersistTo::Master => state.master_persisted,
        other => state.persisted >= other.value(),
    };
    state.replicate_done = state.replicated >= replicate_to.value();
    state
}

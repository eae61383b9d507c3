//! Aggregate traits for the event-sourced domain models (parts, work orders, users).

use crate::error::{DomainError, DomainResult};

/// Aggregate root: identity plus a version counter.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far (the stream revision).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No version check.
    Any,
    /// The stream must be at exactly this revision.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale stream revision (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide/evolve contract shared by every aggregate.
///
/// `handle` looks at the current state and a command and returns the events
/// that should be recorded, without touching `self`. `apply` folds one event
/// into the state and bumps the version by one. Neither may perform IO, so
/// replaying a stream always rebuilds the same state.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

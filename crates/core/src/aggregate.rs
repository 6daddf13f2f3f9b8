//! Aggregate traits shared by every HR domain module.

use crate::error::{DomainError, DomainResult};

/// Identity + version of an event-sourced record (employee, leave request, ...).
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far. Equals the stream revision after rehydration.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the check.
    Any,
    /// The stream must currently be at exactly this revision.
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
                "record was modified concurrently (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide/evolve contract for HR records.
///
/// - `handle(&self, cmd)` validates a command against current state and returns events.
/// - `apply(&mut self, event)` folds one event into state.
///
/// Neither may perform IO. Everything a decision needs (salary, working days,
/// unpaid leave...) is carried on the command.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_rejects_stale_writer() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        let err = ExpectedVersion::Exact(2).check(3).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn any_version_always_matches() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }
}

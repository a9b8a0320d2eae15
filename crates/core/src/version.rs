//! Optimistic concurrency expectation for stored entities.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// The version a caller believes is current for the entity it wants to update.
///
/// There is deliberately no "any version" escape hatch: every update is compared
/// against the stored version before it is written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedVersion(i32);

impl ExpectedVersion {
    pub const fn exact(version: i32) -> Self {
        Self(version)
    }

    /// Use the caller's explicit expectation when given, otherwise the version
    /// that was observed when the entity was read.
    pub fn resolve(explicit: Option<i32>, observed: i32) -> Self {
        Self(explicit.unwrap_or(observed))
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub fn matches(self, actual: i32) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: i32) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "edit conflict (expected version: {}, actual: {actual})",
                self.0
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_expectation_wins_over_observed() {
        assert_eq!(ExpectedVersion::resolve(Some(3), 5).get(), 3);
        assert_eq!(ExpectedVersion::resolve(None, 5).get(), 5);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        assert!(ExpectedVersion::exact(2).check(2).is_ok());
        match ExpectedVersion::exact(1).check(2) {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("actual: 2")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}

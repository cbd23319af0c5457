//! Per-task bookkeeping of which declared prerequisite kinds remain
//! outstanding.
//!
//! Bound at construction to a fixed enumerated set of kinds; there is no
//! original-source equivalent to ground this against (py-evm/trinity track
//! readiness inline on the task record), so this follows the declared set /
//! satisfied set split described for [`crate::prepare::OrderedTaskPreparation`].

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::PrereqError;

/// Tracks which of a fixed set of prerequisite kinds a task still needs.
#[derive(Debug, Clone)]
pub struct PrerequisiteSet<P> {
    declared: HashSet<P>,
    satisfied: HashSet<P>,
}

impl<P> PrerequisiteSet<P>
where
    P: Copy + Eq + Hash,
{
    /// Builds a set that requires every kind in `declared` before it is
    /// complete.
    pub fn new(declared: HashSet<P>) -> Self {
        Self {
            declared,
            satisfied: HashSet::new(),
        }
    }

    /// Marks `kind` satisfied.
    ///
    /// Fails with [`PrereqError::UnknownPrereq`] if `kind` was never
    /// declared, or [`PrereqError::AlreadyFinished`] if it was already
    /// satisfied.
    pub fn finish(&mut self, kind: P) -> Result<(), PrereqError> {
        if !self.declared.contains(&kind) {
            return Err(PrereqError::UnknownPrereq);
        }
        if !self.satisfied.insert(kind) {
            return Err(PrereqError::AlreadyFinished);
        }
        Ok(())
    }

    /// `true` once every declared kind has been satisfied.
    pub fn is_complete(&self) -> bool {
        self.satisfied == self.declared
    }

    /// Satisfies every remaining declared kind at once, used to seed the
    /// dependency root which has no prerequisites to actually wait on.
    pub fn set_complete(&mut self) {
        self.satisfied = self.declared.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(declared: &[&str]) -> PrerequisiteSet<&'static str> {
        PrerequisiteSet::new(declared.iter().copied().collect())
    }

    #[test]
    fn completes_once_every_kind_is_finished() {
        let mut s = set(&["headers", "bodies"]);
        assert!(!s.is_complete());
        s.finish("headers").unwrap();
        assert!(!s.is_complete());
        s.finish("bodies").unwrap();
        assert!(s.is_complete());
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut s = set(&["headers"]);
        let err = s.finish("bodies").unwrap_err();
        assert!(matches!(err, PrereqError::UnknownPrereq));
    }

    #[test]
    fn rejects_double_finish() {
        let mut s = set(&["headers"]);
        s.finish("headers").unwrap();
        let err = s.finish("headers").unwrap_err();
        assert!(matches!(err, PrereqError::AlreadyFinished));
    }

    #[test]
    fn set_complete_satisfies_everything_at_once() {
        let mut s = set(&["headers", "bodies", "receipts"]);
        s.set_complete();
        assert!(s.is_complete());
    }

    #[test]
    fn empty_declared_set_is_complete_immediately() {
        let s: PrerequisiteSet<&str> = PrerequisiteSet::new(HashSet::new());
        assert!(s.is_complete());
    }
}

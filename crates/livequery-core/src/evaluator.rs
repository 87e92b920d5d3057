//! Live query evaluation with change detection.
//!
//! Re-runs a query and decides whether the fresh result is distinguishable
//! from the one handed out last time:
//! - CHANGED: the object sets differ (or, under `ChangeDetection::Revision`,
//!   the index revision moved)
//! - UNCHANGED: the same id/revision pairs, in any order
//! - STALE: the fresh result comes from an older index state than the stored one
//!
//! For UNCHANGED and STALE the previously stored `Arc` is returned, so
//! consumers can rely on pointer equality.

use crate::compare::same_objects;
use crate::config::ChangeDetection;
use crate::error::Result;
use crate::index::{IndexQuery, RevisionedIndex, SearchResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a single evaluation.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// A new result was stored and returned.
    Changed(Arc<SearchResult>),
    /// The fresh result matched the stored one; the stored one is returned.
    Unchanged(Arc<SearchResult>),
    /// The fresh result predates the stored one and was discarded.
    Stale(Arc<SearchResult>),
}

impl Evaluation {
    pub fn result(&self) -> &Arc<SearchResult> {
        match self {
            Evaluation::Changed(result)
            | Evaluation::Unchanged(result)
            | Evaluation::Stale(result) => result,
        }
    }

    pub fn into_result(self) -> Arc<SearchResult> {
        match self {
            Evaluation::Changed(result)
            | Evaluation::Unchanged(result)
            | Evaluation::Stale(result) => result,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Evaluation::Changed(_))
    }
}

#[derive(Debug, Default)]
enum EvaluatorState {
    #[default]
    Uninitialized,
    Settled(Arc<SearchResult>),
}

/// Per-binding evaluator holding the last returned result.
#[derive(Debug, Default)]
pub struct QueryEvaluator {
    state: EvaluatorState,
    detection: ChangeDetection,
}

impl QueryEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detection(detection: ChangeDetection) -> Self {
        Self {
            state: EvaluatorState::Uninitialized,
            detection,
        }
    }

    /// Run `query` against `index` and reconcile with the stored result.
    ///
    /// A failed search leaves the stored result untouched.
    pub fn evaluate(
        &mut self,
        index: &dyn RevisionedIndex,
        query: &IndexQuery,
    ) -> Result<Evaluation> {
        let fresh = index.search(query)?;
        Ok(self.reconcile(fresh))
    }

    /// Reconcile an already executed search result with the stored one.
    pub fn reconcile(&mut self, fresh: SearchResult) -> Evaluation {
        let stored = match &self.state {
            EvaluatorState::Uninitialized => {
                debug!("Initial query result at revision {}", fresh.revision);
                return self.store(fresh);
            }
            EvaluatorState::Settled(stored) => Arc::clone(stored),
        };

        if fresh.revision < stored.revision {
            warn!(
                "Discarding query result from revision {} (already holding {})",
                fresh.revision, stored.revision
            );
            return Evaluation::Stale(stored);
        }

        if fresh.revision != stored.revision && self.detection == ChangeDetection::Revision {
            debug!(
                "Index revision moved {} -> {}",
                stored.revision, fresh.revision
            );
            return self.store(fresh);
        }

        if !same_objects(&stored.results, &fresh.results) {
            debug!("Query objects changed at revision {}", fresh.revision);
            return self.store(fresh);
        }

        debug!(
            "Query result unchanged at revision {} (holding {})",
            fresh.revision, stored.revision
        );
        Evaluation::Unchanged(stored)
    }

    fn store(&mut self, fresh: SearchResult) -> Evaluation {
        let fresh = Arc::new(fresh);
        self.state = EvaluatorState::Settled(Arc::clone(&fresh));
        Evaluation::Changed(fresh)
    }

    /// The last stored result, if any.
    pub fn stored(&self) -> Option<&Arc<SearchResult>> {
        match &self.state {
            EvaluatorState::Uninitialized => None,
            EvaluatorState::Settled(result) => Some(result),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, EvaluatorState::Settled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Indexable, MemoryIndex};

    fn obj(id: &str, revision: u64) -> Arc<Indexable> {
        Arc::new(Indexable::new(id, "Page").with_revision(revision))
    }

    fn result(revision: u64, objects: Vec<Arc<Indexable>>) -> SearchResult {
        SearchResult::new(revision, objects)
    }

    #[test]
    fn test_first_evaluation_is_changed() {
        let mut evaluator = QueryEvaluator::new();
        assert!(!evaluator.is_settled());

        let evaluation = evaluator.reconcile(result(5, vec![obj("A", 1)]));
        assert!(evaluation.is_changed());
        assert!(evaluator.is_settled());
        assert!(Arc::ptr_eq(evaluation.result(), evaluator.stored().unwrap()));
    }

    #[test]
    fn test_revision_change_returns_new_result() {
        let mut evaluator = QueryEvaluator::new();
        let first = evaluator.reconcile(result(5, vec![obj("A", 1), obj("B", 2)])).into_result();

        let second = evaluator.reconcile(result(6, vec![obj("A", 1), obj("B", 3)]));
        assert!(second.is_changed());
        assert!(!Arc::ptr_eq(&first, second.result()));
        assert_eq!(second.result().results[1].revision, Some(3));
    }

    #[test]
    fn test_unrelated_revision_keeps_handle() {
        let mut evaluator = QueryEvaluator::new();
        let first = evaluator.reconcile(result(5, vec![obj("A", 1), obj("B", 2)])).into_result();

        let second = evaluator.reconcile(result(6, vec![obj("B", 2), obj("A", 1)]));
        assert!(matches!(second, Evaluation::Unchanged(_)));
        assert!(Arc::ptr_eq(&first, second.result()));
    }

    #[test]
    fn test_revision_detection_treats_any_move_as_change() {
        let mut evaluator = QueryEvaluator::with_detection(ChangeDetection::Revision);
        let first = evaluator.reconcile(result(5, vec![obj("A", 1), obj("B", 2)])).into_result();

        let same_revision = evaluator.reconcile(result(5, vec![obj("B", 2), obj("A", 1)]));
        assert!(Arc::ptr_eq(&first, same_revision.result()));

        let moved = evaluator.reconcile(result(6, vec![obj("A", 1), obj("B", 2)]));
        assert!(moved.is_changed());
        assert!(!Arc::ptr_eq(&first, moved.result()));
    }

    #[test]
    fn test_same_revision_same_objects_keeps_handle() {
        let mut evaluator = QueryEvaluator::new();
        let first = evaluator.reconcile(result(5, vec![obj("A", 1), obj("B", 2)])).into_result();

        let second = evaluator.reconcile(result(5, vec![obj("B", 2), obj("A", 1)]));
        assert!(matches!(second, Evaluation::Unchanged(_)));
        assert!(Arc::ptr_eq(&first, second.result()));
    }

    #[test]
    fn test_same_revision_different_objects() {
        let mut evaluator = QueryEvaluator::new();
        let first = evaluator.reconcile(result(5, vec![obj("A", 1), obj("B", 2)])).into_result();

        let narrowed = evaluator.reconcile(result(5, vec![obj("A", 1)]));
        assert!(narrowed.is_changed());
        assert!(!Arc::ptr_eq(&first, narrowed.result()));
    }

    #[test]
    fn test_older_result_is_discarded() {
        let mut evaluator = QueryEvaluator::new();
        let newer = evaluator.reconcile(result(8, vec![obj("A", 7)])).into_result();

        let late = evaluator.reconcile(result(6, vec![obj("A", 1)]));
        assert!(matches!(late, Evaluation::Stale(_)));
        assert!(Arc::ptr_eq(&newer, late.result()));
        assert_eq!(evaluator.stored().unwrap().revision, 8);
    }

    #[test]
    fn test_failed_search_keeps_stored_result() {
        let index = MemoryIndex::new();
        index.store(Indexable::new("a.md", "Page").with_file("a.md"));

        let mut evaluator = QueryEvaluator::new();
        let first = evaluator
            .evaluate(&index, &IndexQuery::All)
            .unwrap()
            .into_result();

        let err = evaluator.evaluate(&index, &IndexQuery::PathMatches("(".into()));
        assert!(err.is_err());
        assert!(Arc::ptr_eq(&first, evaluator.stored().unwrap()));
    }

    #[test]
    fn test_evaluate_against_index() {
        let index = MemoryIndex::new();
        index.store(Indexable::new("a.md", "Page"));
        index.store(Indexable::new("b.md", "Page"));

        let mut evaluator = QueryEvaluator::new();
        let first = evaluator.evaluate(&index, &IndexQuery::All).unwrap().into_result();
        let again = evaluator.evaluate(&index, &IndexQuery::All).unwrap();
        assert!(Arc::ptr_eq(&first, again.result()));
        assert!(!again.is_changed());
    }
}

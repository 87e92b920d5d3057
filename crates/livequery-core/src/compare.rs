//! Result-set comparison.

use crate::index::Indexable;
use std::collections::HashMap;
use std::sync::Arc;

/// Determine whether two result sets hold the same objects.
///
/// Order-insensitive: the sets match when they have the same cardinality
/// and every incoming object finds an old object with the same ID and the
/// same revision. An object without a revision never matches anything, not
/// even another object without a revision, so missing revisions always read
/// as a change.
pub fn same_objects(old: &[Arc<Indexable>], incoming: &[Arc<Indexable>]) -> bool {
    if old.len() != incoming.len() {
        return false;
    }

    let mut olds: HashMap<&str, Option<u64>> = HashMap::with_capacity(old.len());
    for indexable in old {
        olds.insert(indexable.id.as_str(), indexable.revision);
    }

    // Each old entry may be claimed once, which keeps the match a bijection.
    incoming.iter().all(|indexable| {
        match (olds.remove(indexable.id.as_str()), indexable.revision) {
            (Some(Some(old_revision)), Some(revision)) => old_revision == revision,
            _ => false,
        }
    })
}

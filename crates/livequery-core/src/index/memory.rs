//! In-memory revisioned index.

use crate::error::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::debug;

use super::events::{SubscriptionToken, UpdateCallback, UpdateRegistry};
use super::query::{CompiledQuery, IndexQuery};
use super::traits::RevisionedIndex;
use super::types::{Indexable, SearchResult};

#[derive(Default)]
struct IndexState {
    revision: u64,
    objects: HashMap<String, Arc<Indexable>>,
}

impl IndexState {
    /// Remove `roots` and every object whose parent chain leads to one of them.
    fn remove_cascading(&mut self, roots: Vec<String>) -> usize {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for object in self.objects.values() {
            if let Some(parent) = object.parent.as_deref() {
                children.entry(parent).or_default().push(object.id.as_str());
            }
        }

        let mut doomed: HashSet<String> = HashSet::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            // Parent links may form cycles.
            if !doomed.insert(id.clone()) {
                continue;
            }
            if let Some(kids) = children.get(id.as_str()) {
                stack.extend(kids.iter().map(|k| k.to_string()));
            }
        }

        let mut removed = 0;
        for id in doomed {
            if self.objects.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

/// Revisioned index holding objects in memory.
///
/// Every effective mutation bumps the global revision once and then fires
/// the `update` event with the new revision. Storing an object whose content
/// is unchanged is not a mutation.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
    listeners: UpdateRegistry,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, stamping it with a fresh revision.
    ///
    /// Returns the index revision after the call.
    pub fn store(&self, mut object: Indexable) -> u64 {
        let revision = {
            let mut state = self.state.write().expect("index lock poisoned");
            if let Some(existing) = state.objects.get(&object.id) {
                if existing.same_content(&object) {
                    return state.revision;
                }
            }

            state.revision += 1;
            object.revision = Some(state.revision);
            debug!("Stored {} at revision {}", object.id, state.revision);
            state.objects.insert(object.id.clone(), Arc::new(object));
            state.revision
        };

        self.listeners.emit(revision);
        revision
    }

    /// Remove an object and all of its descendants.
    ///
    /// Returns how many objects were removed.
    pub fn delete(&self, id: &str) -> usize {
        self.remove_where(|object| object.id == id)
    }

    /// Remove every object backed by `path`, plus their descendants.
    pub fn delete_file(&self, path: &str) -> usize {
        self.remove_where(|object| object.file.as_deref() == Some(path))
    }

    fn remove_where(&self, predicate: impl Fn(&Indexable) -> bool) -> usize {
        let (removed, revision) = {
            let mut state = self.state.write().expect("index lock poisoned");
            let roots: Vec<String> = state
                .objects
                .values()
                .filter(|object| predicate(object))
                .map(|object| object.id.clone())
                .collect();
            if roots.is_empty() {
                return 0;
            }

            let removed = state.remove_cascading(roots);
            state.revision += 1;
            debug!("Removed {} objects at revision {}", removed, state.revision);
            (removed, state.revision)
        };

        self.listeners.emit(revision);
        removed
    }

    /// Stop accepting update listeners and drop the registered ones.
    pub fn shutdown(&self) {
        self.listeners.close();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("index lock poisoned").objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevisionedIndex for MemoryIndex {
    fn revision(&self) -> u64 {
        self.state.read().expect("index lock poisoned").revision
    }

    fn search(&self, query: &IndexQuery) -> Result<SearchResult> {
        let start = Instant::now();
        let compiled = CompiledQuery::compile(query)?;

        let state = self.state.read().expect("index lock poisoned");
        let mut results: Vec<Arc<Indexable>> = state
            .objects
            .values()
            .filter(|object| compiled.matches(object))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(
            "Query {} matched {} objects at revision {} in {:?}",
            query,
            results.len(),
            state.revision,
            start.elapsed()
        );
        Ok(SearchResult::new(state.revision, results))
    }

    fn load(&self, id: &str) -> Option<Arc<Indexable>> {
        let state = self.state.read().expect("index lock poisoned");
        state.objects.get(id).cloned()
    }

    fn on_update(&self, callback: UpdateCallback) -> Result<SubscriptionToken> {
        self.listeners.subscribe(callback)
    }

    fn off(&self, token: SubscriptionToken) -> bool {
        self.listeners.unsubscribe(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiveQueryError;
    use crate::index::types::{FILE_TYPE, SECTION_TYPE};
    use std::sync::Mutex;

    fn page(path: &str) -> Indexable {
        Indexable::new(path, "Page").with_type(FILE_TYPE).with_file(path)
    }

    fn section(path: &str, name: &str) -> Indexable {
        Indexable::new(format!("{}#{}", path, name), "Section")
            .with_type(SECTION_TYPE)
            .with_parent(path)
            .with_file(path)
    }

    #[test]
    fn test_store_stamps_revisions() {
        let index = MemoryIndex::new();
        assert_eq!(index.revision(), 0);

        assert_eq!(index.store(page("a.md")), 1);
        assert_eq!(index.store(page("b.md")), 2);

        assert_eq!(index.load("a.md").unwrap().revision, Some(1));
        assert_eq!(index.load("b.md").unwrap().revision, Some(2));
        assert!(index.load("c.md").is_none());
    }

    #[test]
    fn test_unchanged_store_is_not_a_mutation() {
        let index = MemoryIndex::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        index
            .on_update(Arc::new(move |rev| events_clone.lock().unwrap().push(rev)))
            .unwrap();

        index.store(page("a.md"));
        index.store(page("a.md"));
        assert_eq!(index.revision(), 1);

        index.store(page("a.md").with_field("status", "done"));
        assert_eq!(index.revision(), 2);
        assert_eq!(index.load("a.md").unwrap().revision, Some(2));
        assert_eq!(*events.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_delete_cascades_to_descendants() {
        let index = MemoryIndex::new();
        index.store(page("a.md"));
        index.store(section("a.md", "intro"));
        index.store(
            Indexable::new("a.md#intro/task", "Task").with_parent("a.md#intro"),
        );
        index.store(page("b.md"));

        assert_eq!(index.delete("a.md"), 3);
        assert_eq!(index.len(), 1);
        assert_eq!(index.revision(), 5);

        assert_eq!(index.delete("missing"), 0);
        assert_eq!(index.revision(), 5);
    }

    #[test]
    fn test_delete_terminates_on_parent_cycles() {
        let index = MemoryIndex::new();
        index.store(Indexable::new("self", "Page").with_parent("self"));
        index.store(Indexable::new("a", "Page").with_parent("b"));
        index.store(Indexable::new("b", "Page").with_parent("a"));
        index.store(Indexable::new("a/child", "Task").with_parent("a"));
        index.store(page("keep.md"));

        assert_eq!(index.delete("self"), 1);
        assert_eq!(index.delete("a"), 3);
        assert_eq!(index.len(), 1);
        assert!(index.load("keep.md").is_some());
        assert_eq!(index.search(&IndexQuery::All).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_file() {
        let index = MemoryIndex::new();
        index.store(page("a.md"));
        index.store(section("a.md", "intro"));
        index.store(page("b.md"));

        assert_eq!(index.delete_file("a.md"), 2);
        assert!(index.load("b.md").is_some());
    }

    #[test]
    fn test_search_is_sorted_and_stamped() {
        let index = MemoryIndex::new();
        index.store(page("c.md"));
        index.store(page("a.md"));
        index.store(section("a.md", "intro"));

        let result = index.search(&IndexQuery::of_type(FILE_TYPE)).unwrap();
        assert_eq!(result.revision, 3);
        assert_eq!(result.ids(), vec!["a.md", "c.md"]);

        let children = index.search(&IndexQuery::ChildOf("a.md".into())).unwrap();
        assert_eq!(children.ids(), vec!["a.md#intro"]);
    }

    #[test]
    fn test_search_rejects_invalid_pattern() {
        let index = MemoryIndex::new();
        let err = index
            .search(&IndexQuery::PathMatches("(".into()))
            .unwrap_err();
        assert!(matches!(err, LiveQueryError::InvalidQuery { .. }));
    }

    #[test]
    fn test_listener_may_read_index() {
        let index = Arc::new(MemoryIndex::new());
        let seen = Arc::new(Mutex::new(None));
        let (index_clone, seen_clone) = (Arc::clone(&index), Arc::clone(&seen));
        index
            .on_update(Arc::new(move |_| {
                *seen_clone.lock().unwrap() = Some(index_clone.len());
            }))
            .unwrap();

        index.store(page("a.md"));
        assert_eq!(*seen.lock().unwrap(), Some(1));
    }

    #[test]
    fn test_shutdown_refuses_listeners() {
        let index = MemoryIndex::new();
        index.on_update(Arc::new(|_| {})).unwrap();
        assert_eq!(index.listener_count(), 1);

        index.shutdown();
        assert_eq!(index.listener_count(), 0);
        assert!(index.on_update(Arc::new(|_| {})).is_err());
    }
}

//! Live bindings over a revisioned index.
//!
//! [`LiveIndex`] is the consumer-facing entry point. Each `watch_*` call
//! creates one binding that owns its own watcher subscription, interned
//! query and stored result. Bindings re-evaluate lazily: reading `current()`
//! re-runs the query only when the observed revision or the query changed.

use crate::config::WatchSettings;
use crate::error::Result;
use crate::evaluator::QueryEvaluator;
use crate::index::{IndexQuery, Indexable, RevisionedIndex, SearchResult};
use crate::intern::Interner;
use crate::watcher::RevisionWatcher;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

/// Factory for live bindings over one index.
#[derive(Clone)]
pub struct LiveIndex {
    index: Arc<dyn RevisionedIndex>,
    settings: WatchSettings,
}

impl LiveIndex {
    pub fn new(index: Arc<dyn RevisionedIndex>) -> Self {
        Self {
            index,
            settings: WatchSettings::default(),
        }
    }

    /// Settings used by bindings that do not pass their own.
    pub fn with_settings(mut self, settings: WatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn index(&self) -> &Arc<dyn RevisionedIndex> {
        &self.index
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    fn resolve(&self, settings: Option<&WatchSettings>) -> WatchSettings {
        settings.copied().unwrap_or(self.settings)
    }

    /// Watch the index revision.
    pub fn watch_revision(&self, settings: Option<&WatchSettings>) -> Result<RevisionWatcher> {
        RevisionWatcher::observe(Arc::clone(&self.index), &self.resolve(settings))
    }

    /// Watch the full result of a query.
    pub fn watch_query(
        &self,
        query: IndexQuery,
        settings: Option<&WatchSettings>,
    ) -> Result<LiveQuery> {
        let settings = self.resolve(settings);
        let watcher = RevisionWatcher::observe(Arc::clone(&self.index), &settings)?;
        debug!("Created live query {}", query);
        Ok(LiveQuery::new(
            watcher,
            query,
            QueryEvaluator::with_detection(settings.change_detection),
        ))
    }

    /// Watch only the result objects of a query.
    pub fn watch_query_simple(
        &self,
        query: IndexQuery,
        settings: Option<&WatchSettings>,
    ) -> Result<LiveResults> {
        Ok(LiveResults {
            inner: self.watch_query(query, settings)?,
        })
    }

    /// Watch a single object by ID.
    pub fn watch_object(
        &self,
        id: impl Into<String>,
        settings: Option<&WatchSettings>,
    ) -> Result<LiveObject> {
        let watcher = RevisionWatcher::observe(Arc::clone(&self.index), &self.resolve(settings))?;
        Ok(LiveObject {
            watcher,
            id: id.into(),
            loaded_at: None,
            value: None,
        })
    }
}

/// Memo key of the last evaluation attempt.
struct EvaluatedAt {
    revision: u64,
    query: Arc<IndexQuery>,
}

/// A query whose result follows the index.
///
/// Consecutive reads return the same `Arc<SearchResult>` for as long as the
/// visible result is unchanged, so `Arc::ptr_eq` is a valid change check.
pub struct LiveQuery {
    watcher: RevisionWatcher,
    interner: Interner<IndexQuery>,
    query: Arc<IndexQuery>,
    evaluator: QueryEvaluator,
    evaluated_at: Option<EvaluatedAt>,
    last_returned: Option<Arc<SearchResult>>,
}

impl LiveQuery {
    fn new(watcher: RevisionWatcher, query: IndexQuery, evaluator: QueryEvaluator) -> Self {
        let mut interner = Interner::structural();
        let query = interner.intern(query);
        Self {
            watcher,
            interner,
            query,
            evaluator,
            evaluated_at: None,
            last_returned: None,
        }
    }

    /// Current result, re-running the query if the revision or query moved.
    ///
    /// A failed search is returned as an error once; until the revision or
    /// query changes again, reads fall back to the last good result.
    pub fn current(&mut self) -> Result<Arc<SearchResult>> {
        let revision = self.watcher.current();
        let up_to_date = self
            .evaluated_at
            .as_ref()
            .is_some_and(|at| at.revision == revision && Arc::ptr_eq(&at.query, &self.query));

        if up_to_date {
            if let Some(stored) = self.evaluator.stored() {
                let stored = Arc::clone(stored);
                self.last_returned = Some(Arc::clone(&stored));
                return Ok(stored);
            }
        }

        self.evaluated_at = Some(EvaluatedAt {
            revision,
            query: Arc::clone(&self.query),
        });

        match self.evaluator.evaluate(&**self.watcher.index(), &self.query) {
            Ok(evaluation) => {
                let result = evaluation.into_result();
                self.last_returned = Some(Arc::clone(&result));
                Ok(result)
            }
            Err(err) if err.is_retryable() => {
                warn!("Live query {} failed at revision {}: {}", self.query, revision, err);
                Err(err)
            }
            Err(err) => {
                warn!("Live query {} rejected until it changes: {}", self.query, err);
                Err(err)
            }
        }
    }

    /// Replace the query. Returns false if it is equal to the current one,
    /// in which case nothing is re-evaluated.
    pub fn set_query(&mut self, query: IndexQuery) -> bool {
        let interned = self.interner.intern(query);
        let changed = !Arc::ptr_eq(&interned, &self.query);
        self.query = interned;
        changed
    }

    pub fn query(&self) -> Arc<IndexQuery> {
        Arc::clone(&self.query)
    }

    /// Latest observed index revision.
    pub fn revision(&self) -> u64 {
        self.watcher.current()
    }

    /// Wait for the next observed revision change, then read the result.
    ///
    /// The result may be the same handle as before if nothing visible moved.
    pub async fn updated(&mut self) -> Result<Arc<SearchResult>> {
        self.watcher.changed().await?;
        self.current()
    }

    /// Wait until the result handle differs from the last one returned.
    pub async fn next_change(&mut self) -> Result<Arc<SearchResult>> {
        let baseline = self.last_returned.clone();
        loop {
            let result = self.current()?;
            let same = baseline
                .as_ref()
                .is_some_and(|previous| Arc::ptr_eq(previous, &result));
            if !same {
                return Ok(result);
            }
            self.watcher.changed().await?;
        }
    }
}

/// Result objects of a live query, sharing the query's stable handle.
#[derive(Debug, Clone)]
pub struct QueryResults(Arc<SearchResult>);

impl QueryResults {
    /// Whether both views point at the same underlying result.
    pub fn ptr_eq(&self, other: &QueryResults) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn revision(&self) -> u64 {
        self.0.revision
    }

    pub fn into_inner(self) -> Arc<SearchResult> {
        self.0
    }
}

impl Deref for QueryResults {
    type Target = [Arc<Indexable>];

    fn deref(&self) -> &Self::Target {
        &self.0.results
    }
}

/// A live query that only exposes its result objects.
pub struct LiveResults {
    inner: LiveQuery,
}

impl LiveResults {
    pub fn current(&mut self) -> Result<QueryResults> {
        self.inner.current().map(QueryResults)
    }

    pub fn set_query(&mut self, query: IndexQuery) -> bool {
        self.inner.set_query(query)
    }

    pub async fn updated(&mut self) -> Result<QueryResults> {
        self.inner.updated().await.map(QueryResults)
    }

    pub async fn next_change(&mut self) -> Result<QueryResults> {
        self.inner.next_change().await.map(QueryResults)
    }
}

/// A single object that follows the index.
pub struct LiveObject {
    watcher: RevisionWatcher,
    id: String,
    loaded_at: Option<u64>,
    value: Option<Arc<Indexable>>,
}

impl LiveObject {
    /// Current object, reloaded only when the observed revision moved.
    pub fn current(&mut self) -> Option<Arc<Indexable>> {
        let revision = self.watcher.current();
        if self.loaded_at != Some(revision) {
            self.value = self.watcher.index().load(&self.id);
            self.loaded_at = Some(revision);
        }
        self.value.clone()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Point the binding at another object.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if id != self.id {
            self.id = id;
            self.loaded_at = None;
        }
    }

    pub async fn updated(&mut self) -> Result<Option<Arc<Indexable>>> {
        self.watcher.changed().await?;
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiveQueryError;
    use crate::index::{MemoryIndex, FILE_TYPE};

    fn page(path: &str) -> Indexable {
        Indexable::new(path, "Page").with_type(FILE_TYPE).with_file(path)
    }

    fn setup() -> (Arc<MemoryIndex>, LiveIndex) {
        let index = Arc::new(MemoryIndex::new());
        let live = LiveIndex::new(index.clone()).with_settings(WatchSettings::immediate());
        (index, live)
    }

    #[test]
    fn test_current_is_memoised() {
        let (index, live) = setup();
        index.store(page("a.md"));

        let mut query = live.watch_query(IndexQuery::All, None).unwrap();
        let first = query.current().unwrap();
        let second = query.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.ids(), vec!["a.md"]);
    }

    #[test]
    fn test_relevant_mutation_produces_new_handle() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut query = live.watch_query(IndexQuery::of_type(FILE_TYPE), None).unwrap();
        let first = query.current().unwrap();

        index.store(page("b.md"));
        let second = query.current().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.ids(), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_unrelated_mutation_keeps_handle() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut query = live.watch_query(IndexQuery::Id("a.md".into()), None).unwrap();
        let first = query.current().unwrap();

        index.store(page("b.md"));
        assert_eq!(query.revision(), 2);
        let second = query.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_equal_query_is_interned() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut query = live
            .watch_query(IndexQuery::field("status", "done"), None)
            .unwrap();
        let interned = query.query();

        assert!(!query.set_query(IndexQuery::field("status", "done")));
        assert!(Arc::ptr_eq(&interned, &query.query()));

        assert!(query.set_query(IndexQuery::of_type(FILE_TYPE)));
        assert_eq!(query.current().unwrap().len(), 1);
    }

    #[test]
    fn test_query_change_without_mutation_reuses_equal_result() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut query = live.watch_query(IndexQuery::All, None).unwrap();
        let first = query.current().unwrap();

        // Different descriptor, same visible objects at the same revision.
        query.set_query(IndexQuery::of_type(FILE_TYPE));
        let second = query.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_query_falls_back_and_retries() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut query = live.watch_query(IndexQuery::All, None).unwrap();
        let good = query.current().unwrap();

        query.set_query(IndexQuery::PathMatches("(".into()));
        let err = query.current().unwrap_err();
        assert!(matches!(err, LiveQueryError::InvalidQuery { .. }));

        // No-op tick: the last good result stays visible.
        assert!(Arc::ptr_eq(&good, &query.current().unwrap()));

        // A revision change retries, and fails again for a bad pattern.
        index.store(page("b.md"));
        assert!(query.current().is_err());

        query.set_query(IndexQuery::PathMatches(r"\.md$".into()));
        assert_eq!(query.current().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_initial_query_keeps_erroring() {
        let (_index, live) = setup();
        let mut query = live
            .watch_query(IndexQuery::PathMatches("[".into()), None)
            .unwrap();
        assert!(query.current().is_err());
        assert!(query.current().is_err());
    }

    #[test]
    fn test_simple_results_share_handle() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut results = live.watch_query_simple(IndexQuery::All, None).unwrap();

        let first = results.current().unwrap();
        let second = results.current().unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "a.md");
        assert_eq!(first.revision(), 1);
    }

    #[test]
    fn test_watch_object() {
        let (index, live) = setup();
        index.store(page("a.md"));
        let mut object = live.watch_object("a.md", None).unwrap();

        let first = object.current().unwrap();
        index.store(page("b.md"));
        let second = object.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        index.store(page("a.md").with_field("status", "done"));
        let third = object.current().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));

        index.delete("a.md");
        assert!(object.current().is_none());

        object.set_id("b.md");
        assert_eq!(object.current().unwrap().id, "b.md");
    }

    #[test]
    fn test_bindings_register_once_each() {
        let (index, live) = setup();
        let mut query = live.watch_query(IndexQuery::All, None).unwrap();
        for _ in 0..5 {
            query.current().unwrap();
        }
        let revision = live.watch_revision(None).unwrap();
        assert_eq!(index.listener_count(), 2);

        drop(query);
        drop(revision);
        assert_eq!(index.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_change_skips_no_op_ticks() {
        let index = Arc::new(MemoryIndex::new());
        let live = LiveIndex::new(index.clone());
        index.store(page("a.md"));

        let mut query = live
            .watch_query(IndexQuery::Id("a.md".into()), Some(&WatchSettings::with_debounce_ms(50)))
            .unwrap();
        let first = query.next_change().await.unwrap();

        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                index.store(page("b.md"));
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                index.store(page("a.md").with_field("status", "done"));
            })
        };

        let changed = query.next_change().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(changed.results[0].revision, Some(3));
        writer.await.unwrap();
    }
}

//! The index interface the live layer consumes.

use crate::error::Result;
use std::sync::Arc;

use super::events::{SubscriptionToken, UpdateCallback};
use super::query::IndexQuery;
use super::types::{Indexable, SearchResult};

/// A revisioned object index.
///
/// The revision counter advances on every mutation. `search` must be
/// deterministic for a fixed query and revision. The live layer only reads
/// from the index and never mutates it.
pub trait RevisionedIndex: Send + Sync {
    /// Current global revision.
    fn revision(&self) -> u64;

    /// Execute a query against the current index state.
    fn search(&self, query: &IndexQuery) -> Result<SearchResult>;

    /// Point lookup by ID.
    fn load(&self, id: &str) -> Option<Arc<Indexable>>;

    /// Register a callback fired with the new revision after each mutation.
    fn on_update(&self, callback: UpdateCallback) -> Result<SubscriptionToken>;

    /// Remove a previously registered callback.
    fn off(&self, token: SubscriptionToken) -> bool;
}

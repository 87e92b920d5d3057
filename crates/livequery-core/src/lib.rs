//! livequery core - Debounced, reference-stable live queries over a revisioned index.
//!
//! An index advances a revision counter on every mutation and fires an
//! `update` event. This crate turns that into live bindings: a consumer
//! registers a query, gets debounced wake-ups, and reads a result handle
//! that only changes when the query's visible answer changed.
//!
//! # Example
//!
//! ```rust,ignore
//! use livequery_core::{IndexQuery, Indexable, LiveIndex, MemoryIndex, FILE_TYPE};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> livequery_core::Result<()> {
//!     let index = Arc::new(MemoryIndex::new());
//!     let live = LiveIndex::new(index.clone());
//!
//!     let mut files = live.watch_query(IndexQuery::of_type(FILE_TYPE), None)?;
//!     println!("{} files", files.current()?.len());
//!
//!     index.store(Indexable::new("notes/a.md", "Page").with_type(FILE_TYPE));
//!     let changed = files.next_change().await?;
//!     println!("{} files at revision {}", changed.len(), changed.revision);
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod compare;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod intern;
pub mod literal;
pub mod live;
pub mod watcher;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use compare::same_objects;
pub use config::{ChangeDetection, WatchConfig, WatchSettings};
pub use error::{LiveQueryError, Result};
pub use evaluator::{Evaluation, QueryEvaluator};
pub use index::{
    IndexQuery, Indexable, MemoryIndex, RevisionedIndex, SearchResult, SubscriptionToken,
    UpdateCallback, FILE_TYPE, SECTION_TYPE,
};
pub use intern::Interner;
pub use literal::Literal;
pub use live::{LiveIndex, LiveObject, LiveQuery, LiveResults, QueryResults};
pub use watcher::RevisionWatcher;

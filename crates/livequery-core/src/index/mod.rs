//! The revisioned index the live layer observes.
//!
//! This module provides:
//! - The `RevisionedIndex` interface (revision, search, load, update events)
//! - Indexable objects, search results and query descriptors
//! - `MemoryIndex`, an in-memory implementation with cascading deletes

mod events;
mod memory;
mod query;
mod traits;
mod types;

pub use events::{SubscriptionToken, UpdateCallback, UpdateRegistry};
pub use memory::MemoryIndex;
pub use query::{CompiledQuery, IndexQuery};
pub use traits::RevisionedIndex;
pub use types::{Indexable, SearchResult, FILE_TYPE, SECTION_TYPE};

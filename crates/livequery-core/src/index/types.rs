//! Indexable objects and search results.

use crate::literal::Literal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Type tag carried by file-backed objects.
pub const FILE_TYPE: &str = "file";
/// Type tag carried by sections derived from a file.
pub const SECTION_TYPE: &str = "section";

/// An object stored in a revisioned index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indexable {
    /// Type tags this object carries.
    pub types: BTreeSet<String>,
    /// Display name of the object's type, such as `Page` or `Section`.
    pub typename: String,
    /// Unique index ID.
    pub id: String,
    /// Owning object. Removing the parent removes this object too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Index revision at this object's last content change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    /// Backing file, if file-derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Literal>,
}

impl Indexable {
    pub fn new(id: impl Into<String>, typename: impl Into<String>) -> Self {
        Self {
            types: BTreeSet::new(),
            typename: typename.into(),
            id: id.into(),
            parent: None,
            revision: None,
            file: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.types.insert(tag.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.types.contains(tag)
    }

    /// Compare everything except the index-assigned revision.
    pub fn same_content(&self, other: &Indexable) -> bool {
        self.id == other.id
            && self.typename == other.typename
            && self.types == other.types
            && self.parent == other.parent
            && self.file == other.file
            && self.fields == other.fields
    }
}

/// Result of executing a query against an index.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Global index revision when the query ran.
    pub revision: u64,
    pub results: Vec<Arc<Indexable>>,
}

impl SearchResult {
    pub fn new(revision: u64, results: Vec<Arc<Indexable>>) -> Self {
        Self { revision, results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// IDs of the results, in result order.
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|o| o.id.as_str()).collect()
    }
}

//! Query descriptors and their compiled form.

use crate::error::{LiveQueryError, Result};
use crate::literal::Literal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Indexable;

/// A structural description of which objects to retrieve.
///
/// Descriptors are plain values: two separately built descriptors with the
/// same shape and literals are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum IndexQuery {
    /// Every object in the index.
    All,
    /// Objects carrying the given type tag.
    Type(String),
    /// The object with the given ID.
    Id(String),
    /// Direct children of the given object.
    ChildOf(String),
    /// Objects backed by the given file.
    File(String),
    /// Objects whose backing file path matches a regular expression.
    PathMatches(String),
    /// Objects whose field equals the literal.
    Field { key: String, value: Literal },
    /// Objects that define the field at all.
    HasField(String),
    And(Vec<IndexQuery>),
    Or(Vec<IndexQuery>),
    Not(Box<IndexQuery>),
}

impl IndexQuery {
    pub fn of_type(tag: impl Into<String>) -> Self {
        IndexQuery::Type(tag.into())
    }

    pub fn field(key: impl Into<String>, value: impl Into<Literal>) -> Self {
        IndexQuery::Field {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn and(self, other: IndexQuery) -> Self {
        match self {
            IndexQuery::And(mut parts) => {
                parts.push(other);
                IndexQuery::And(parts)
            }
            query => IndexQuery::And(vec![query, other]),
        }
    }

    pub fn negate(self) -> Self {
        IndexQuery::Not(Box::new(self))
    }
}

impl fmt::Display for IndexQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexQuery::All => write!(f, "all"),
            IndexQuery::Type(tag) => write!(f, "type({:?})", tag),
            IndexQuery::Id(id) => write!(f, "id({:?})", id),
            IndexQuery::ChildOf(id) => write!(f, "childof({:?})", id),
            IndexQuery::File(path) => write!(f, "file({:?})", path),
            IndexQuery::PathMatches(pattern) => write!(f, "path({:?})", pattern),
            IndexQuery::Field { key, value } => write!(f, "{} = {}", key, value),
            IndexQuery::HasField(key) => write!(f, "exists({})", key),
            IndexQuery::And(parts) => write_group(f, "and", parts),
            IndexQuery::Or(parts) => write_group(f, "or", parts),
            IndexQuery::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, op: &str, parts: &[IndexQuery]) -> fmt::Result {
    write!(f, "{}(", op)?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}

/// A descriptor validated and prepared for matching.
#[derive(Debug)]
pub enum CompiledQuery<'q> {
    All,
    Type(&'q str),
    Id(&'q str),
    ChildOf(&'q str),
    File(&'q str),
    PathMatches(Regex),
    Field { key: &'q str, value: &'q Literal },
    HasField(&'q str),
    And(Vec<CompiledQuery<'q>>),
    Or(Vec<CompiledQuery<'q>>),
    Not(Box<CompiledQuery<'q>>),
}

impl<'q> CompiledQuery<'q> {
    /// Validate and compile a descriptor.
    ///
    /// Fails with `InvalidQuery` when a path pattern is not a valid regex.
    pub fn compile(query: &'q IndexQuery) -> Result<Self> {
        Ok(match query {
            IndexQuery::All => CompiledQuery::All,
            IndexQuery::Type(tag) => CompiledQuery::Type(tag),
            IndexQuery::Id(id) => CompiledQuery::Id(id),
            IndexQuery::ChildOf(id) => CompiledQuery::ChildOf(id),
            IndexQuery::File(path) => CompiledQuery::File(path),
            IndexQuery::PathMatches(pattern) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| LiveQueryError::invalid_query(query, e.to_string()))?;
                CompiledQuery::PathMatches(regex)
            }
            IndexQuery::Field { key, value } => CompiledQuery::Field { key, value },
            IndexQuery::HasField(key) => CompiledQuery::HasField(key),
            IndexQuery::And(parts) => CompiledQuery::And(compile_all(parts)?),
            IndexQuery::Or(parts) => CompiledQuery::Or(compile_all(parts)?),
            IndexQuery::Not(inner) => CompiledQuery::Not(Box::new(CompiledQuery::compile(inner)?)),
        })
    }

    pub fn matches(&self, object: &Indexable) -> bool {
        match self {
            CompiledQuery::All => true,
            CompiledQuery::Type(tag) => object.has_type(tag),
            CompiledQuery::Id(id) => object.id == *id,
            CompiledQuery::ChildOf(id) => object.parent.as_deref() == Some(*id),
            CompiledQuery::File(path) => object.file.as_deref() == Some(*path),
            CompiledQuery::PathMatches(regex) => {
                object.file.as_deref().is_some_and(|file| regex.is_match(file))
            }
            CompiledQuery::Field { key, value } => object.fields.get(*key) == Some(*value),
            CompiledQuery::HasField(key) => object.fields.contains_key(*key),
            CompiledQuery::And(parts) => parts.iter().all(|p| p.matches(object)),
            CompiledQuery::Or(parts) => parts.iter().any(|p| p.matches(object)),
            CompiledQuery::Not(inner) => !inner.matches(object),
        }
    }
}

fn compile_all(parts: &[IndexQuery]) -> Result<Vec<CompiledQuery<'_>>> {
    parts.iter().map(CompiledQuery::compile).collect()
}

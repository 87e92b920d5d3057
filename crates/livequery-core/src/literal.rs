//! Structural literal values and their total ordering.
//!
//! Query descriptors carry literal payloads (field values, for example). Two
//! descriptors are the same query when their literals compare equal here, no
//! matter which allocation they live in.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A structural value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<Literal>),
    /// Unordered collection; see [`Literal::set`] for the canonical form.
    Set(Vec<Literal>),
    Object(BTreeMap<String, Literal>),
}

impl Literal {
    /// Build a set literal, sorting and deduplicating its members.
    pub fn set(values: impl IntoIterator<Item = Literal>) -> Self {
        let mut values: Vec<Literal> = values.into_iter().collect();
        canonicalize(&mut values);
        Literal::Set(values)
    }

    /// Build an object literal from key/value pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Literal)>) -> Self {
        Literal::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Literal::Null => 0,
            Literal::Boolean(_) => 1,
            Literal::Number(_) => 2,
            Literal::String(_) => 3,
            Literal::List(_) => 4,
            Literal::Set(_) => 5,
            Literal::Object(_) => 6,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Total comparison of two literals.
///
/// Values of different kinds order by kind. Numbers use `f64::total_cmp`,
/// lists compare lexicographically, sets compare by their sorted members and
/// objects by their sorted `(key, value)` pairs.
pub fn compare(a: &Literal, b: &Literal) -> Ordering {
    match (a, b) {
        (Literal::Null, Literal::Null) => Ordering::Equal,
        (Literal::Boolean(x), Literal::Boolean(y)) => x.cmp(y),
        (Literal::Number(x), Literal::Number(y)) => x.total_cmp(y),
        (Literal::String(x), Literal::String(y)) => x.cmp(y),
        (Literal::List(x), Literal::List(y)) => compare_sequences(x, y),
        (Literal::Set(x), Literal::Set(y)) => compare_sequences(&canonical(x), &canonical(y)),
        (Literal::Object(x), Literal::Object(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| compare(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => a.kind_rank().cmp(&b.kind_rank()),
    }
}

fn compare_sequences(x: &[Literal], y: &[Literal]) -> Ordering {
    for (a, b) in x.iter().zip(y.iter()) {
        let ord = compare(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

fn canonicalize(values: &mut Vec<Literal>) {
    values.sort_by(compare);
    values.dedup_by(|a, b| compare(a, b) == Ordering::Equal);
}

/// Set members in canonical order, cloning only when the stored order is not.
fn canonical(values: &[Literal]) -> Cow<'_, [Literal]> {
    let sorted = values
        .windows(2)
        .all(|pair| compare(&pair[0], &pair[1]) == Ordering::Less);
    if sorted {
        Cow::Borrowed(values)
    } else {
        let mut owned = values.to_vec();
        canonicalize(&mut owned);
        Cow::Owned(owned)
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for Literal {}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Literal {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

/// Integers share the `Number` representation with JSON numbers.
///
/// Values within ±2^53 convert exactly. Larger magnitudes round to the
/// nearest `f64`, so neighbouring large integers can compare equal, the same
/// as when they arrive as JSON numbers.
impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Number(value as f64)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<serde_json::Value> for Literal {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Literal::Null,
            serde_json::Value::Bool(b) => Literal::Boolean(b),
            serde_json::Value::Number(n) => Literal::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Literal::String(s),
            serde_json::Value::Array(items) => {
                Literal::List(items.into_iter().map(Literal::from).collect())
            }
            serde_json::Value::Object(map) => {
                Literal::Object(map.into_iter().map(|(k, v)| (k, Literal::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::List(items) => write_joined(f, "[", items.iter(), "]"),
            Literal::Set(items) => write_joined(f, "set(", items.iter(), ")"),
            Literal::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl Iterator<Item = &'a Literal>,
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

//! Value interning.
//!
//! An [`Interner`] keeps the oldest value that is still equal to the latest
//! one it was given. Feeding it a stream of semantically equal values yields
//! the same `Arc` every time, so consumers can detect "nothing changed" with
//! `Arc::ptr_eq` instead of a deep comparison.

use std::fmt;
use std::sync::Arc;

/// A single interned value slot with its equality predicate.
///
/// `equals` must be an equivalence relation. The slot is owned by exactly one
/// binding and is never shared.
pub struct Interner<T, F = fn(&T, &T) -> bool> {
    current: Option<Arc<T>>,
    equals: F,
}

impl<T: PartialEq> Interner<T> {
    /// An interner using `PartialEq` as the equality predicate.
    pub fn structural() -> Self {
        Self::new(|a: &T, b: &T| a == b)
    }
}

impl<T, F> Interner<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    pub fn new(equals: F) -> Self {
        Self {
            current: None,
            equals,
        }
    }

    /// Return the stored value if it equals `value`, otherwise store `value`.
    pub fn intern(&mut self, value: T) -> Arc<T> {
        if let Some(current) = &self.current {
            if (self.equals)(&**current, &value) {
                return Arc::clone(current);
            }
        }
        self.replace(Arc::new(value))
    }

    /// Like [`intern`](Self::intern), for values that are already shared.
    pub fn intern_arc(&mut self, value: Arc<T>) -> Arc<T> {
        if let Some(current) = &self.current {
            if Arc::ptr_eq(current, &value) || (self.equals)(&**current, &*value) {
                return Arc::clone(current);
            }
        }
        self.replace(value)
    }

    fn replace(&mut self, value: Arc<T>) -> Arc<T> {
        self.current = Some(Arc::clone(&value));
        value
    }

    pub fn current(&self) -> Option<Arc<T>> {
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Interner<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

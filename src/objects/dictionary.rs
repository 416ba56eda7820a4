//! Dictionary objects

use super::{Name, Object};
use crate::error::{PdfError, Result};
use indexmap::IndexMap;

/// A mapping from names to values.
///
/// Entries keep their insertion order for output stability, but equality is
/// order-independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<Name, Object>,
}

impl Dictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Dictionary {
            entries: IndexMap::new(),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Get a mutable value by key
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.entries.get_mut(key)
    }

    /// Get a value that must be present
    pub fn require(&self, key: &[u8]) -> Result<&Object> {
        self.get(key).ok_or_else(|| {
            PdfError::contract(format!(
                "missing required key /{}",
                String::from_utf8_lossy(key)
            ))
        })
    }

    /// Insert or replace a value, returning the previous one
    pub fn set(&mut self, key: impl Into<Name>, value: impl Into<Object>) -> Option<Object> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    /// Check if a key is present
    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter()
    }

    /// Iterate over all entries mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Object)> {
        self.entries.iter_mut()
    }

    /// Iterate over all keys
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    /// Value of `/Type`, if it is a name
    pub fn get_type(&self) -> Option<&[u8]> {
        match self.get(b"Type") {
            Some(Object::Name(name)) => Some(name.as_bytes()),
            _ => None,
        }
    }

    /// Check whether `/Type` equals the given name
    pub fn has_type(&self, expected: &[u8]) -> bool {
        self.get_type() == Some(expected)
    }
}

impl FromIterator<(Name, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        Dictionary {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Dictionary {
    type Item = (Name, Object);
    type IntoIter = indexmap::map::IntoIter<Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

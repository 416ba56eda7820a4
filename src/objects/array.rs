//! Array objects

use super::Object;
use crate::error::{PdfError, Result};

/// An ordered sequence of values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    items: Vec<Object>,
}

impl Array {
    pub fn new() -> Self {
        Array { items: Vec::new() }
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Object> {
        self.items.get_mut(index)
    }

    pub fn push(&mut self, value: impl Into<Object>) {
        self.items.push(value.into());
    }

    /// Insert at `index`; `index == len` appends.
    pub fn insert(&mut self, index: usize, value: impl Into<Object>) -> Result<()> {
        if index > self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        self.items.insert(index, value.into());
        Ok(())
    }

    /// Replace the value at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, value: impl Into<Object>) -> Result<Object> {
        let len = self.items.len();
        let slot = self.items.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
        Ok(std::mem::replace(slot, value.into()))
    }

    pub fn remove(&mut self, index: usize) -> Result<Object> {
        if index >= self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Object> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[Object] {
        &self.items
    }
}

fn out_of_range(index: usize, len: usize) -> PdfError {
    PdfError::contract(format!("array index {} out of range (len {})", index, len))
}

impl From<Vec<Object>> for Array {
    fn from(items: Vec<Object>) -> Self {
        Array { items }
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<T: IntoIterator<Item = Object>>(iter: T) -> Self {
        Array {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Array {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

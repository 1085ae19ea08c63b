//! Coarse-locked baseline: one `RwLock` around a sorted vector searched linearly.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct SimpleSet {
    values: RwLock<Vec<i64>>,
}

impl SimpleSet {
    pub fn new() -> Self {
        SimpleSet::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<i64>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<i64>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index of the first element `>= value`.
    fn position(values: &[i64], value: i64) -> usize {
        values
            .iter()
            .position(|&v| v >= value)
            .unwrap_or_else(|| values.len())
    }

    pub fn insert(&self, value: i64) -> bool {
        let mut values = self.write();
        let at = Self::position(&values, value);
        if values.get(at) == Some(&value) {
            return false;
        }
        values.insert(at, value);
        true
    }

    pub fn delete(&self, value: i64) -> bool {
        let mut values = self.write();
        let at = Self::position(&values, value);
        if values.get(at) != Some(&value) {
            return false;
        }
        values.remove(at);
        true
    }

    pub fn contains(&self, value: i64) -> bool {
        let values = self.read();
        values.get(Self::position(&values, value)) == Some(&value)
    }

    /// Holds the read lock for the whole walk, so unlike `IntList::range` this sees a snapshot.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(i64) -> bool,
    {
        for &v in self.read().iter() {
            if !visit(v) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

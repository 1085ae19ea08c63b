//! A concurrent ordered set of `i64` values.
//!
//! [`IntList`] is a sorted singly-linked list guarded by per-node locks. Reads (`contains`,
//! `range`, `len`) never take a lock; `insert` locks the predecessor of the target position and
//! `delete` locks the target and then its predecessor, revalidating and retrying from the head
//! whenever a concurrent mutation got there first. Unlinked nodes are reclaimed through
//! `crossbeam`'s epoch collector once no reader can still be looking at them.
//!
//! [`SimpleSet`] offers the same operations behind a single `RwLock` and exists to compare
//! against.
//!
//! ```
//! use clist::IntList;
//!
//! let set = IntList::new();
//! assert!(set.insert(5));
//! assert!(!set.insert(5));
//! assert!(set.contains(5));
//! assert!(set.delete(5));
//! assert_eq!(set.len(), 0);
//! ```

pub mod check;
pub mod list;
pub mod simple;

pub use self::check::InvariantError;
pub use self::list::IntList;
pub use self::simple::SimpleSet;

/// The operations shared by every set in this crate.
///
/// Implementations must give identical answers for the same sequential history, which is what
/// lets the benchmark and the tests swap one for another.
pub trait IntSet: Send + Sync {
    /// Adds `value`, returning `false` if it was already present.
    fn insert(&self, value: i64) -> bool;

    /// Removes `value`, returning `false` if it was not present.
    fn delete(&self, value: i64) -> bool;

    fn contains(&self, value: i64) -> bool;

    /// Calls `visit` on each member in ascending order until it returns `false`.
    fn range<F: FnMut(i64) -> bool>(&self, visit: F);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntSet for IntList {
    fn insert(&self, value: i64) -> bool {
        IntList::insert(self, value)
    }

    fn delete(&self, value: i64) -> bool {
        IntList::delete(self, value)
    }

    fn contains(&self, value: i64) -> bool {
        IntList::contains(self, value)
    }

    fn range<F: FnMut(i64) -> bool>(&self, visit: F) {
        IntList::range(self, visit)
    }

    fn len(&self) -> usize {
        IntList::len(self)
    }
}

impl IntSet for SimpleSet {
    fn insert(&self, value: i64) -> bool {
        SimpleSet::insert(self, value)
    }

    fn delete(&self, value: i64) -> bool {
        SimpleSet::delete(self, value)
    }

    fn contains(&self, value: i64) -> bool {
        SimpleSet::contains(self, value)
    }

    fn range<F: FnMut(i64) -> bool>(&self, visit: F) {
        SimpleSet::range(self, visit)
    }

    fn len(&self) -> usize {
        SimpleSet::len(self)
    }
}

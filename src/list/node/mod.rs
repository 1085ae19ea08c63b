use crossbeam::epoch::Atomic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A link in the sorted chain.
///
/// `key` is `None` only for the head sentinel, and `None` orders below every `Some(_)`,
/// so the sentinel never collides with a stored value.
pub(super) struct Node {
    pub(super) key: Option<i64>,
    marked: AtomicBool,
    pub(super) next: Atomic<Node>,
    lock: Mutex<()>,
}

impl Node {
    pub(super) fn sentinel() -> Self {
        Node {
            key: None,
            marked: AtomicBool::new(false),
            next: Atomic::null(),
            lock: Mutex::new(()),
        }
    }

    pub(super) fn new(value: i64) -> Self {
        Node {
            key: Some(value),
            ..Node::sentinel()
        }
    }

    pub(super) fn holds(&self, value: i64) -> bool {
        self.key == Some(value)
    }

    pub(super) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    /// Only called once, with `lock` held.
    pub(super) fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }

    // The critical sections never panic, so a poisoned lock still guards a consistent node.
    pub(super) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

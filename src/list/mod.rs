//! The lock-coupled sorted list.
//!
//! Every node carries its own mutex. A successor link is only ever rewritten by the thread
//! holding the lock of the node that owns the link, and readers follow links with acquire
//! loads only, so they never block and never see a half-built node.
//!
//! Lock order: `insert` takes a single lock (the predecessor). `delete` takes the victim's lock
//! before its predecessor's. No thread ever holds a predecessor while waiting for its
//! successor, so no cycle of waiters can form.
//!
//! Retries are unbounded busy loops without backoff. Under heavy contention on one region of
//! the list a thread can keep losing validation and starve.

mod node;

use self::node::Node;
use crossbeam::epoch::{self, Guard, Owned, Shared};
use tracing::{debug, trace};

use std::convert::TryFrom;
use std::fmt;
use std::iter::FromIterator;
use std::sync::atomic::{AtomicI64, Ordering};

/// A concurrent sorted set of `i64`.
///
/// Share it between threads behind an `Arc` (or a scoped borrow); every operation takes
/// `&self`.
pub struct IntList {
    head: Node,
    len: AtomicI64,
}

impl Default for IntList {
    fn default() -> Self {
        IntList::new()
    }
}

impl IntList {
    pub fn new() -> Self {
        debug!(target: "clist::list", event = "list_new");
        IntList {
            head: Node::sentinel(),
            len: AtomicI64::new(0),
        }
    }

    /// Finds the adjacent pair `(a, b)` with `a.key < value <= b.key`.
    ///
    /// `b` is null when every member is smaller than `value`. Neither locks nor marks are
    /// consulted, so the pair may already be stale when it is returned.
    fn search<'g>(&'g self, value: i64, guard: &'g Guard) -> (&'g Node, Shared<'g, Node>) {
        let target = Some(value);
        let mut a = &self.head;
        let mut b = a.next.load(Ordering::Acquire, guard);
        // nodes reachable under `guard` are not reclaimed until it unpins
        while let Some(n) = unsafe { b.as_ref() } {
            if n.key >= target {
                break;
            }
            a = n;
            b = n.next.load(Ordering::Acquire, guard);
        }
        (a, b)
    }

    /// Adds `value` to the set. Returns `false` if an unmarked node already holds it.
    pub fn insert(&self, value: i64) -> bool {
        let guard = &epoch::pin();
        loop {
            let (a, b) = self.search(value, guard);
            if let Some(found) = unsafe { b.as_ref() } {
                if found.holds(value) {
                    if found.is_marked() {
                        // a delete is unlinking it; the value is about to become insertable
                        trace!(target: "clist::list", event = "insert_retry", value, reason = "marked");
                        continue;
                    }
                    return false;
                }
            }

            let held = a.lock();
            if a.is_marked() || a.next.load(Ordering::Acquire, guard) != b {
                drop(held);
                trace!(target: "clist::list", event = "insert_retry", value, reason = "predecessor_changed");
                continue;
            }

            let x = Owned::new(Node::new(value));
            x.next.store(b, Ordering::Relaxed);
            a.next.store(x, Ordering::Release);
            drop(held);

            self.len.fetch_add(1, Ordering::AcqRel);
            return true;
        }
    }

    /// Removes `value` from the set. Returns `false` if it was absent, or if a concurrent
    /// delete marked it first.
    pub fn delete(&self, value: i64) -> bool {
        let guard = &epoch::pin();
        loop {
            let (a, b) = self.search(value, guard);
            let victim = match unsafe { b.as_ref() } {
                Some(n) if n.holds(value) => n,
                _ => return false,
            };

            let victim_held = victim.lock();
            if victim.is_marked() {
                return false;
            }

            let pred_held = a.lock();
            if a.is_marked() || a.next.load(Ordering::Acquire, guard) != b {
                drop(pred_held);
                drop(victim_held);
                trace!(target: "clist::list", event = "delete_retry", value, reason = "predecessor_changed");
                continue;
            }

            victim.mark();
            a.next
                .store(victim.next.load(Ordering::Acquire, guard), Ordering::Release);
            drop(pred_held);
            drop(victim_held);

            // `b` is unreachable now: its only predecessor was rewritten under lock, and a
            // marked predecessor fails every later validation.
            unsafe { guard.defer_destroy(b) };
            self.len.fetch_sub(1, Ordering::AcqRel);
            return true;
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        let guard = &epoch::pin();
        let (_, b) = self.search(value, guard);
        match unsafe { b.as_ref() } {
            Some(n) => n.holds(value) && !n.is_marked(),
            None => false,
        }
    }

    /// Calls `visit` with each member in ascending order, stopping early once it returns
    /// `false`.
    ///
    /// The walk is weakly consistent: values inserted or deleted while it runs may or may not
    /// be seen, but what is seen is always strictly ascending.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(i64) -> bool,
    {
        let guard = &epoch::pin();
        let mut x = self.head.next.load(Ordering::Acquire, guard);
        while let Some(n) = unsafe { x.as_ref() } {
            if !n.is_marked() {
                if let Some(v) = n.key {
                    if !visit(v) {
                        break;
                    }
                }
            }
            x = n.next.load(Ordering::Acquire, guard);
        }
    }

    /// Net count of successful inserts and deletes.
    ///
    /// A delete can overtake the counter update of the insert it undoes, so the tally may dip
    /// below zero for an instant; that reads as `0`.
    pub fn len(&self) -> usize {
        usize::try_from(self.len.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects the current members. Same consistency as [`IntList::range`].
    pub fn to_vec(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.len());
        self.range(|v| {
            out.push(v);
            true
        });
        out
    }
}

impl Drop for IntList {
    fn drop(&mut self) {
        debug!(target: "clist::list", event = "list_drop", len = self.len());
        // `&mut self`: no reader can be pinned on this list any more
        unsafe {
            let guard = epoch::unprotected();
            let mut cur = self.head.next.load(Ordering::Relaxed, guard);
            while !cur.is_null() {
                let next = cur.deref().next.load(Ordering::Relaxed, guard);
                drop(cur.into_owned());
                cur = next;
            }
        }
    }
}

impl Extend<i64> for IntList {
    fn extend<I: IntoIterator<Item = i64>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}

impl FromIterator<i64> for IntList {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut list = IntList::new();
        list.extend(iter);
        list
    }
}

impl fmt::Debug for IntList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check;
    use rand::seq::SliceRandom;
    use rand::{thread_rng, Rng};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    const OSC: Ordering = Ordering::SeqCst;

    #[test]
    fn list_basics() {
        let l = IntList::new();
        assert_eq!(l.len(), 0);
        assert!(l.is_empty());
        assert!(!l.contains(0));

        assert!(l.insert(0));
        assert_eq!(l.len(), 1);
        assert!(l.contains(0));
        assert!(l.delete(0));
        assert_eq!(l.len(), 0);

        assert!(l.insert(20));
        assert!(l.insert(22));
        assert!(l.insert(21));
        assert_eq!(l.len(), 3);
        assert_eq!(l.to_vec(), vec![20, 21, 22]);

        assert!(l.delete(21));
        assert_eq!(l.len(), 2);
        assert_eq!(l.to_vec(), vec![20, 22]);
        assert!(!l.delete(21));
        assert!(!l.delete(100));
    }

    #[test]
    fn list_duplicate_insert() {
        let l = IntList::new();
        assert!(l.insert(3));
        assert!(!l.insert(3));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn list_round_trip() {
        let l = IntList::new();
        l.insert(5);
        assert!(l.contains(5));
        l.delete(5);
        assert!(!l.contains(5));
        assert_eq!(l.len(), 0);
        // and again, after the node has been unlinked
        assert!(l.insert(5));
        assert!(l.contains(5));
    }

    #[test]
    fn list_extremes() {
        let l: IntList = vec![i64::MAX, 0, i64::MIN, -1].into_iter().collect();
        assert_eq!(l.to_vec(), vec![i64::MIN, -1, 0, i64::MAX]);
        assert!(l.contains(i64::MIN));
        assert!(l.delete(i64::MIN));
        assert!(!l.contains(i64::MIN));
        assert_eq!(format!("{:?}", l), "{-1, 0, 9223372036854775807}");
    }

    #[test]
    fn list_range_stops_early() {
        let l: IntList = (1..=10).collect();
        let mut seen = Vec::new();
        l.range(|v| {
            seen.push(v);
            v < 4
        });
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn list_concurrent_insert_contains_delete() {
        const N: i64 = 4096;
        let nthreads = 8;
        let mut values: Vec<i64> = (1..=N).collect();
        values.shuffle(&mut thread_rng());
        let values = Arc::new(values);
        let l = Arc::new(IntList::new());

        let spawn_all = |f: fn(&IntList, i64) -> bool| {
            let mut threads = vec![];
            for t in 0..nthreads {
                let l = Arc::clone(&l);
                let values = Arc::clone(&values);
                threads.push(thread::spawn(move || {
                    for &v in values.iter().skip(t).step_by(nthreads) {
                        assert!(f(&*l, v), "operation failed for {}", v);
                    }
                }));
            }
            for t in threads {
                t.join().unwrap();
            }
        };

        spawn_all(IntList::insert);
        assert_eq!(l.len(), N as usize);
        assert!(!l.contains(0));
        check::quiescent(&*l).unwrap();

        spawn_all(IntList::contains);
        spawn_all(IntList::delete);
        assert_eq!(l.len(), 0);
        assert!(l.to_vec().is_empty());
    }

    #[test]
    fn list_concurrent_mixed() {
        let l = Arc::new(IntList::new());
        let inserted = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let mut threads = vec![];
        for _ in 0..8 {
            let l = Arc::clone(&l);
            let inserted = Arc::clone(&inserted);
            let deleted = Arc::clone(&deleted);
            threads.push(thread::spawn(move || {
                let mut rng = thread_rng();
                for _ in 0..20_000 {
                    let v = rng.gen_range(1..=256);
                    match rng.gen_range(0..1000) {
                        0..=332 => {
                            if l.insert(v) {
                                inserted.fetch_add(1, OSC);
                            }
                        }
                        333..=665 => {
                            l.contains(v);
                        }
                        999 => {
                            check::ascending(&*l).unwrap();
                        }
                        _ => {
                            if l.delete(v) {
                                deleted.fetch_add(1, OSC);
                            }
                        }
                    }
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(
            l.len(),
            inserted.load(OSC) - deleted.load(OSC),
            "count conservation"
        );
        check::quiescent(&*l).unwrap();
    }

    #[test]
    fn list_concurrent_transfer() {
        let count = 2000;
        let x = Arc::new((0..count).collect::<IntList>());
        let y = Arc::new(IntList::new());
        let mut threads = vec![];
        for _ in 0..16 {
            let x = Arc::clone(&x);
            let y = Arc::clone(&y);
            threads.push(thread::spawn(move || {
                x.range(|v| {
                    if x.delete(v) {
                        assert!(y.insert(v), "{} moved twice", v);
                    }
                    true
                });
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(x.len(), 0);
        assert_eq!(y.len(), count as usize);
        check::quiescent(&*y).unwrap();
    }

    #[test]
    fn list_concurrent_contention() {
        let l = Arc::new(IntList::new());
        let inserted = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let mut threads = vec![];
        for _ in 0..16 {
            let l = Arc::clone(&l);
            let inserted = Arc::clone(&inserted);
            let deleted = Arc::clone(&deleted);
            threads.push(thread::spawn(move || {
                let mut rng = thread_rng();
                for _ in 0..1000 {
                    let v = rng.gen_range(0..10);
                    if rng.gen::<bool>() {
                        if l.delete(v) {
                            deleted.fetch_add(1, OSC);
                        }
                    } else if l.insert(v) {
                        inserted.fetch_add(1, OSC);
                    }
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        let (ins, del) = (inserted.load(OSC), deleted.load(OSC));
        assert!(ins >= del);
        assert_eq!(l.len(), ins - del);
        check::quiescent(&*l).unwrap();
    }
}

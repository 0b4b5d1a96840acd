use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};

use crate::ordering::Policy;

/// Position value of an element that is no longer stored in any heap.
const DETACHED: usize = usize::MAX;

/// Bookkeeping shared between a queued element and every clone of its [`Handle`].
///
/// Only the heap that owns the element writes to it, and only while it holds
/// exclusive access to its backing array.
#[derive(Debug)]
struct Slot {
    position: AtomicUsize,
    priority: AtomicI64,
}

/// Caller-side reference to an enqueued element.
///
/// Handles are opaque: they can be read and cloned but the position they carry
/// is maintained by the heap alone. A handle outlives its element; once the
/// element is dequeued, removed or cleared the handle reports no position and
/// every operation given it treats it as "not found".
#[derive(Clone)]
pub struct Handle {
    slot: Arc<Slot>,
}

impl Handle {
    /// Last priority assigned to the element.
    pub fn priority(&self) -> i64 {
        self.slot.priority.load(Ordering::Acquire)
    }

    /// Current index in the backing array, `None` once the element left the heap.
    pub fn position(&self) -> Option<usize> {
        match self.slot.position.load(Ordering::Acquire) {
            DETACHED => None,
            position => Some(position),
        }
    }

    pub fn is_queued(&self) -> bool {
        self.position().is_some()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("position", &self.position())
            .field("priority", &self.priority())
            .finish()
    }
}

/// A value and its priority, as stored in the backing array.
#[derive(Debug)]
pub struct Entry<T> {
    value: T,
    priority: i64,
    slot: Arc<Slot>,
}

impl<T> Entry<T> {
    pub fn new(value: T, priority: i64) -> Self {
        Self {
            value,
            priority,
            slot: Arc::new(Slot {
                position: AtomicUsize::new(DETACHED),
                priority: AtomicI64::new(priority),
            }),
        }
    }

    pub fn handle(&self) -> Handle {
        Handle {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn into_value(self) -> T {
        self.value
    }

    fn set_position(&self, position: usize) {
        self.slot.position.store(position, Ordering::Release);
    }

    fn set_priority(&mut self, priority: i64) {
        self.priority = priority;
        self.slot.priority.store(priority, Ordering::Release);
    }

    fn key(&self) -> (&T, i64) {
        (&self.value, self.priority)
    }
}

/// Array backed binary heap whose elements always know their own index.
///
/// Bad indices are programming errors and panic; callers validate them first,
/// which is what [`PriorityQueue`](crate::PriorityQueue) does.
#[derive(Debug)]
pub struct IndexedHeap<T> {
    entries: Vec<Entry<T>>,
    policy: Policy<T>,
}

impl<T> IndexedHeap<T> {
    pub fn new(policy: Policy<T>) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &Policy<T> {
        &self.policy
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry<T>> {
        self.entries.get(index)
    }

    pub fn peek(&self) -> Option<&Entry<T>> {
        self.entries.first()
    }

    /// Entries in array order. Only the first one is guaranteed to be the best.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }

    /// `true` if the element at `i` has strictly higher priority than the one at `j`.
    pub fn compare(&self, i: usize, j: usize) -> bool {
        self.policy
            .outranks(self.entries[i].key(), self.entries[j].key())
    }

    /// Exchanges two elements and refreshes both stored positions.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.entries.swap(i, j);
        self.entries[i].set_position(i);
        self.entries[j].set_position(j);
    }

    /// Appends `entry` and sifts it up to its place.
    pub fn push_raw(&mut self, entry: Entry<T>) -> usize {
        let index = self.entries.len();
        entry.set_position(index);
        self.entries.push(entry);
        self.sift_up(index)
    }

    /// Extracts the root.
    ///
    /// # Panics
    /// If the heap is empty.
    pub fn pop_raw(&mut self) -> Entry<T> {
        assert!(!self.entries.is_empty(), "pop_raw on an empty heap");
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let root = self.detach_last();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        root
    }

    /// Restores the heap property around `index` after its key changed.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn fix(&mut self, index: usize) {
        assert!(index < self.entries.len(), "fix index {index} out of bounds");
        if self.sift_up(index) == index {
            self.sift_down(index);
        }
    }

    /// Removes the element at `index`, whatever its rank.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> Entry<T> {
        assert!(
            index < self.entries.len(),
            "remove_at index {index} out of bounds"
        );
        let last = self.entries.len() - 1;
        if index != last {
            self.swap(index, last);
        }
        let removed = self.detach_last();
        if index < self.entries.len() {
            self.fix(index);
        }
        removed
    }

    /// Sets a new priority on the element at `index` and repositions it.
    pub fn set_priority(&mut self, index: usize, priority: i64) {
        self.entries[index].set_priority(priority);
        self.fix(index);
    }

    /// Index of the live element `handle` refers to, if it is one of ours.
    ///
    /// A position alone is not enough: after the element left, another one may
    /// occupy the same index, or the handle may come from a different heap.
    pub fn locate(&self, handle: &Handle) -> Option<usize> {
        let position = handle.position()?;
        let entry = self.entries.get(position)?;
        Arc::ptr_eq(&entry.slot, &handle.slot).then_some(position)
    }

    /// Checks the heap property and that every element knows its own index.
    pub fn is_heap(&self) -> bool {
        self.entries.iter().enumerate().all(|(i, entry)| {
            let child_ok = |child: usize| child >= self.size() || !self.compare(child, i);
            entry.slot.position.load(Ordering::Acquire) == i
                && child_ok(2 * i + 1)
                && child_ok(2 * i + 2)
        })
    }

    /// Re-derives every stored position and the heap order from scratch.
    ///
    /// Used after a comparator panicked mid-sift and left the order half done.
    pub fn rebuild(&mut self) {
        for (i, entry) in self.entries.iter().enumerate() {
            entry.set_position(i);
        }
        for i in (0..self.entries.len() / 2).rev() {
            self.sift_down(i);
        }
    }

    /// Drops every element and detaches all outstanding handles.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.set_position(DETACHED);
        }
    }

    fn detach_last(&mut self) -> Entry<T> {
        let Some(entry) = self.entries.pop() else {
            unreachable!("callers check for emptiness first");
        };
        entry.set_position(DETACHED);
        entry
    }

    /// Moves the element at `index` towards the root. Returns its final index.
    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.compare(index, parent) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
        index
    }

    /// Moves the element at `index` towards the leaves. Returns its final index.
    fn sift_down(&mut self, mut index: usize) -> usize {
        let len = self.entries.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break; // leaf
            }
            let right = left + 1;

            let mut best = left;
            if right < len && self.compare(right, left) {
                best = right;
            }
            if !self.compare(best, index) {
                break;
            }
            self.swap(index, best);
            index = best;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::{Entry, IndexedHeap};
    use crate::ordering::{Direction, Policy};

    fn heap_with(policy: Policy<i64>, priorities: &[i64]) -> IndexedHeap<i64> {
        let mut heap = IndexedHeap::new(policy);
        for &p in priorities {
            heap.push_raw(Entry::new(p, p));
        }
        heap
    }

    fn assert_valid<T>(heap: &IndexedHeap<T>) {
        for (i, entry) in heap.iter().enumerate() {
            assert_eq!(entry.handle().position(), Some(i));
            for child in [2 * i + 1, 2 * i + 2] {
                if child < heap.size() {
                    assert!(!heap.compare(child, i), "child {child} outranks parent {i}");
                }
            }
        }
        assert!(heap.is_heap());
    }

    #[test]
    fn push_keeps_best_at_root() {
        let heap = heap_with(Policy::ascending(), &[5, 3, 8, 1, 9, 2]);

        assert_eq!(heap.size(), 6);
        assert_eq!(heap.peek().map(Entry::priority), Some(1));
        assert_valid(&heap);
    }

    #[test]
    fn pop_yields_sorted_sequence() {
        let mut heap = heap_with(Policy::descending(), &[4, 7, 1, 7, 3, 9, 0]);

        let mut out = vec![];
        while !heap.is_empty() {
            out.push(heap.pop_raw().into_value());
            assert_valid(&heap);
        }
        assert_eq!(out, vec![9, 7, 7, 4, 3, 1, 0]);
    }

    #[test]
    fn popped_entry_is_detached() {
        let mut heap = heap_with(Policy::ascending(), &[2, 1]);
        let handle = heap.peek().map(Entry::handle).unwrap();

        let popped = heap.pop_raw();
        assert_eq!(popped.priority(), 1);
        assert_eq!(handle.position(), None);
        assert_eq!(heap.locate(&handle), None);
    }

    #[test]
    fn swap_updates_positions() {
        let mut heap = heap_with(Policy::ascending(), &[1, 2, 3]);
        let first = heap.get(0).unwrap().handle();
        let last = heap.get(2).unwrap().handle();

        heap.swap(0, 2);
        assert_eq!(first.position(), Some(2));
        assert_eq!(last.position(), Some(0));
    }

    /// Lowering a leaf's key moves it up; raising the root's key moves it down.
    #[test]
    fn fix_moves_both_ways() {
        let mut heap = heap_with(Policy::ascending(), &[1, 2, 3, 4, 5, 6, 7]);
        let leaf = heap.get(6).unwrap().handle();
        let root = heap.get(0).unwrap().handle();

        heap.set_priority(6, 0);
        assert_eq!(leaf.position(), Some(0));
        assert_valid(&heap);

        let index = heap.locate(&root).unwrap();
        heap.set_priority(index, 100);
        assert_eq!(root.priority(), 100);
        assert_eq!(root.position().map(|p| 2 * p + 1 >= heap.size()), Some(true));
        assert_valid(&heap);
    }

    #[test]
    fn remove_at_middle_and_last() {
        let mut heap = heap_with(Policy::ascending(), &[1, 5, 2, 6, 7, 3, 4]);

        let removed = heap.remove_at(1);
        assert_eq!(removed.priority(), 5);
        assert_valid(&heap);

        let last = heap.size() - 1;
        heap.remove_at(last);
        assert_eq!(heap.size(), 5);
        assert_valid(&heap);
    }

    /// Moving the last element into a hole can require sifting it up, not down.
    #[test]
    fn remove_at_can_sift_up() {
        let mut heap = heap_with(Policy::ascending(), &[0, 10, 1, 11, 12, 2, 3]);

        heap.remove_at(4);
        assert_valid(&heap);
        assert_eq!(heap.get(1).map(Entry::priority), Some(3));
    }

    #[test]
    fn rebuild_restores_order() {
        let mut heap = heap_with(Policy::ascending(), &[1, 2, 3, 4, 5, 6]);
        // Scramble the array behind the heap's back, positions included.
        heap.entries.reverse();
        assert!(!heap.is_heap());

        heap.rebuild();
        assert_valid(&heap);
        let out: Vec<_> = (0..6).map(|_| heap.pop_raw().into_value()).collect();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn clear_detaches_everything() {
        let mut heap = heap_with(Policy::ascending(), &[3, 1, 2]);
        let handles: Vec<_> = heap.iter().map(Entry::handle).collect();

        heap.clear();
        assert!(heap.is_empty());
        assert!(handles.iter().all(|h| !h.is_queued()));
    }

    #[test]
    fn locate_rejects_foreign_handles() {
        let heap = heap_with(Policy::ascending(), &[1, 2]);
        let other = heap_with(Policy::ascending(), &[1, 2]);
        let foreign = other.get(0).unwrap().handle();

        assert_eq!(foreign.position(), Some(0));
        assert_eq!(heap.locate(&foreign), None);
        assert_eq!(other.locate(&foreign), Some(0));
    }

    #[test]
    fn comparator_heap() {
        let policy = Policy::with_comparator(
            |a: &&str, b: &&str| a.len().cmp(&b.len()),
            Direction::Descending,
        );
        let mut heap = IndexedHeap::new(policy);
        for word in ["a", "abcd", "ab", "abc"] {
            heap.push_raw(Entry::new(word, 0));
        }

        let out: Vec<_> = (0..4).map(|_| heap.pop_raw().into_value()).collect();
        assert_eq!(out, vec!["abcd", "abc", "ab", "a"]);
    }

    #[test]
    #[should_panic(expected = "empty heap")]
    fn pop_raw_on_empty_panics() {
        let mut heap = IndexedHeap::<u8>::new(Policy::ascending());
        heap.pop_raw();
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn fix_out_of_bounds_panics() {
        let mut heap = heap_with(Policy::ascending(), &[1]);
        heap.fix(1);
    }
}

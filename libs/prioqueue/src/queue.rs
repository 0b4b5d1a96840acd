use std::{
    cmp::Ordering as CmpOrdering,
    fmt::{self, Debug, Write},
    sync::{
        PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    heap::{Entry, Handle, IndexedHeap},
    ordering::{Direction, Policy},
};

/// Copy of a queued element, as returned by [`PriorityQueue::to_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item<T> {
    pub value: T,
    pub priority: i64,
}

/// Thread-safe priority queue.
///
/// All operations are atomic: writers (`enqueue`, `dequeue`, `drain`, `clear`,
/// `update_priority`, `remove`) take the lock exclusively for their whole
/// duration, readers (`peek`, `is_empty`, `to_snapshot`, `render`) share it.
/// `size` does not lock at all, it reads a counter that every writer refreshes
/// before releasing the lock.
///
/// A writer that panics (only a caller comparator can) poisons the lock. The
/// next operation, `size` included, rebuilds the heap order and the counter
/// before it proceeds.
///
/// Elements with equal priority come out in no particular order.
pub struct PriorityQueue<T> {
    heap: RwLock<IndexedHeap<T>>,
    len: AtomicUsize,
}

impl<T> PriorityQueue<T> {
    /// Min-first queue ordered by numeric priority.
    pub fn new() -> Self {
        Self::with_policy(Policy::ascending())
    }

    /// Max-first queue ordered by numeric priority.
    pub fn new_max() -> Self {
        Self::with_policy(Policy::descending())
    }

    /// Queue ordered by `compare` over the values; priorities are kept but not consulted.
    pub fn with_comparator<F>(compare: F, direction: Direction) -> Self
    where
        F: Fn(&T, &T) -> CmpOrdering + Send + Sync + 'static,
    {
        Self::with_policy(Policy::with_comparator(compare, direction))
    }

    pub fn with_policy(policy: Policy<T>) -> Self {
        Self {
            heap: RwLock::new(IndexedHeap::new(policy)),
            len: AtomicUsize::new(0),
        }
    }

    pub fn direction(&self) -> Direction {
        self.read().policy().direction()
    }

    /// Inserts `value` and returns a handle for later `update_priority`/`remove` calls.
    pub fn enqueue(&self, value: T, priority: i64) -> Handle {
        let mut heap = self.write();
        let entry = Entry::new(value, priority);
        let handle = entry.handle();
        let index = heap.push_raw(entry);
        self.sync_len(&heap);
        trace!(priority, index, size = heap.size(), "enqueued");
        handle
    }

    /// Removes and returns the highest priority value, `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut heap = self.write();
        if heap.is_empty() {
            return None;
        }
        let entry = heap.pop_raw();
        self.sync_len(&heap);
        trace!(priority = entry.priority(), size = heap.size(), "dequeued");
        Some(entry.into_value())
    }

    /// Dequeues up to `n` values in priority order as a single atomic step.
    pub fn drain(&self, n: usize) -> Vec<T> {
        let mut heap = self.write();
        let count = n.min(heap.size());
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(heap.pop_raw().into_value());
        }
        self.sync_len(&heap);
        trace!(requested = n, drained = count, size = heap.size(), "drained");
        items
    }

    /// Highest priority value without removing it.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_with(|value, _| value.clone())
    }

    /// Runs `f` on the highest priority value and its priority while holding the read lock.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T, i64) -> R) -> Option<R> {
        self.read()
            .peek()
            .map(|entry| f(entry.value(), entry.priority()))
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of queued elements as of the last completed mutation.
    pub fn size(&self) -> usize {
        if self.heap.is_poisoned() {
            drop(self.write());
        }
        self.len.load(Ordering::Acquire)
    }

    /// Drops every element. Handles issued so far become stale.
    pub fn clear(&self) {
        let mut heap = self.write();
        let dropped = heap.size();
        heap.clear();
        self.sync_len(&heap);
        debug!(dropped, "cleared");
    }

    /// Assigns `priority` to the element behind `handle` and repositions it.
    ///
    /// A stale handle (element already dequeued, removed or cleared, or issued by
    /// another queue) is ignored without any signal.
    pub fn update_priority(&self, handle: &Handle, priority: i64) {
        let mut heap = self.write();
        let Some(index) = heap.locate(handle) else {
            debug!(?handle, priority, "update_priority ignored stale handle");
            return;
        };
        heap.set_priority(index, priority);
        trace!(from = index, priority, "priority updated");
    }

    /// Removes the element behind `handle`, `None` if the handle is stale.
    pub fn remove(&self, handle: &Handle) -> Option<T> {
        let mut heap = self.write();
        let Some(index) = heap.locate(handle) else {
            debug!(?handle, "remove ignored stale handle");
            return None;
        };
        let entry = heap.remove_at(index);
        self.sync_len(&heap);
        trace!(index, priority = entry.priority(), size = heap.size(), "removed");
        Some(entry.into_value())
    }

    /// Copies of all elements in heap (array) order; only the first is guaranteed to be the best.
    pub fn to_snapshot(&self) -> Vec<Item<T>>
    where
        T: Clone,
    {
        self.read()
            .iter()
            .map(|entry| Item {
                value: entry.value().clone(),
                priority: entry.priority(),
            })
            .collect()
    }

    /// Human readable dump of the queue, for diagnostics only.
    pub fn render(&self) -> String
    where
        T: Debug,
    {
        let heap = self.read();
        if heap.is_empty() {
            return "PriorityQueue[]".to_string();
        }

        let mut out = format!(
            "PriorityQueue[{}-heap, size={}]:",
            heap.policy().direction().heap_kind(),
            heap.size()
        );
        for (i, entry) in heap.iter().enumerate() {
            // Writing into a String cannot fail.
            let _ = write!(
                out,
                "\n  [{i}] Value: {:?}, Priority: {}",
                entry.value(),
                entry.priority()
            );
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn is_heap(&self) -> bool {
        self.read().is_heap()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexedHeap<T>> {
        if self.heap.is_poisoned() {
            drop(self.write());
        }
        self.heap.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexedHeap<T>> {
        match self.heap.write() {
            Ok(heap) => heap,
            Err(poisoned) => {
                let mut heap = poisoned.into_inner();
                self.repair(&mut heap);
                heap
            }
        }
    }

    /// Brings the heap and the size counter back in line after a writer panicked,
    /// e.g. inside a caller comparator, between two swaps.
    ///
    /// If the comparator panics again while rebuilding, the lock stays poisoned
    /// and the next caller retries.
    fn repair(&self, heap: &mut IndexedHeap<T>) {
        warn!(size = heap.size(), "rebuilding heap after a panicked writer");
        heap.rebuild();
        self.sync_len(heap);
        self.heap.clear_poison();
    }

    fn sync_len(&self, heap: &IndexedHeap<T>) {
        self.len.store(heap.size(), Ordering::Release);
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> fmt::Display for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl<T: Debug> Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("heap", &*self.read())
            .finish()
    }
}

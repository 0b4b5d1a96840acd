//! Generic, thread-safe priority queue.
//!
//! Values are enqueued with an `i64` priority and come out best-first, where
//! "best" is the smallest priority for a min-queue ([`PriorityQueue::new`]), the
//! largest for a max-queue ([`PriorityQueue::new_max`]), or whatever a caller
//! supplied comparator decides ([`PriorityQueue::with_comparator`]).
//!
//! Every enqueue returns a [`Handle`] that can later re-prioritise or remove that
//! very element, wherever the heap has moved it in the meantime.
//!
//! ```rust
//! use prioqueue::PriorityQueue;
//!
//! let pq = PriorityQueue::new();
//! pq.enqueue("low", 10);
//! let high = pq.enqueue("high", 1);
//! pq.enqueue("medium", 5);
//!
//! pq.update_priority(&high, 20);
//! assert_eq!(pq.dequeue(), Some("medium"));
//! assert_eq!(pq.dequeue(), Some("low"));
//! assert_eq!(pq.dequeue(), Some("high"));
//! assert_eq!(pq.dequeue(), None);
//! ```

pub mod heap;
pub mod ordering;
mod queue;
pub mod stress;

// region:    --- Exports
pub use heap::Handle;
pub use ordering::{Comparator, Direction, Policy};
pub use queue::{Item, PriorityQueue};
// endregion: --- Exports

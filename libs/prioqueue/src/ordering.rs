use std::{cmp::Ordering, fmt};

/// Which end of the priority scale is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Smaller priorities are dequeued first (min-heap).
    #[default]
    Ascending,
    /// Larger priorities are dequeued first (max-heap).
    Descending,
}

impl Direction {
    /// Short label used by the queue's textual rendering.
    pub fn heap_kind(&self) -> &'static str {
        match self {
            Direction::Ascending => "min",
            Direction::Descending => "max",
        }
    }

    /// Translates a three-way comparison of `a` against `b` into "does `a` outrank `b`".
    pub fn outranks(&self, ord: Ordering) -> bool {
        match self {
            Direction::Ascending => ord == Ordering::Less,
            Direction::Descending => ord == Ordering::Greater,
        }
    }
}

/// Caller supplied three-way comparison over payloads.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Decides which of two queued elements has the higher priority.
///
/// Chosen once when the queue is built and never changed afterwards. With
/// [`Policy::Comparator`] the numeric priority is still stored and reported,
/// but it plays no part in the ordering.
pub enum Policy<T> {
    /// Compare the numeric priorities.
    Priority(Direction),
    /// Compare the payloads with a caller supplied function.
    Comparator {
        direction: Direction,
        compare: Comparator<T>,
    },
}

impl<T> Policy<T> {
    pub fn ascending() -> Self {
        Policy::Priority(Direction::Ascending)
    }

    pub fn descending() -> Self {
        Policy::Priority(Direction::Descending)
    }

    pub fn with_comparator<F>(compare: F, direction: Direction) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Policy::Comparator {
            direction,
            compare: Box::new(compare),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Policy::Priority(direction) => *direction,
            Policy::Comparator { direction, .. } => *direction,
        }
    }

    /// Raw three-way comparison of two `(value, priority)` pairs, before the
    /// direction is applied.
    pub fn compare(&self, a: (&T, i64), b: (&T, i64)) -> Ordering {
        match self {
            Policy::Priority(_) => a.1.cmp(&b.1),
            Policy::Comparator { compare, .. } => compare(a.0, b.0),
        }
    }

    /// `true` when `a` must be served strictly before `b`.
    pub fn outranks(&self, a: (&T, i64), b: (&T, i64)) -> bool {
        self.direction().outranks(self.compare(a, b))
    }
}

impl<T> Default for Policy<T> {
    fn default() -> Self {
        Policy::ascending()
    }
}

impl<T> fmt::Debug for Policy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Priority(direction) => f.debug_tuple("Priority").field(direction).finish(),
            Policy::Comparator { direction, .. } => f
                .debug_struct("Comparator")
                .field("direction", direction)
                .finish_non_exhaustive(),
        }
    }
}

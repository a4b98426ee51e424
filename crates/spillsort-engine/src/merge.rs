//! Priority-queue k-way merge over sealed runs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use spillsort_core::error::Result;
use spillsort_core::order::CompareFn;
use spillsort_core::processor::Processor;

/// Streaming view over one sealed run.
///
/// `top` observes the run's current minimum; `pop` yields it and
/// advances. Runs are non-decreasing, so `top` never moves backwards.
/// Implementations load their first record at construction.
pub trait RunCursor<T> {
    fn top(&self) -> Option<&T>;

    fn pop(&mut self) -> Result<Option<T>>;
}

struct HeapEntry<'a, T> {
    cursor: Box<dyn RunCursor<T> + 'a>,
    compare: CompareFn<T>,
}

impl<T> HeapEntry<'_, T> {
    fn top(&self) -> &T {
        self.cursor.top().expect("cursor in heap has a record")
    }
}

impl<T> PartialEq for HeapEntry<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<'_, T> {}

impl<T> PartialOrd for HeapEntry<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we pop minima.
        (*self.compare)(other.top(), self.top())
    }
}

/// Merge `cursors` into `output` in comparator order.
///
/// Empty cursors never enter the heap. The inner loop keeps draining the
/// current minimum cursor for as long as its top stays at or below the
/// runner-up's, which skips a heap reshuffle per record when the input
/// stream was already almost sorted. Ties across cursors break
/// arbitrarily.
pub fn merge_runs<'a, T>(
    cursors: Vec<Box<dyn RunCursor<T> + 'a>>,
    cmp: &CompareFn<T>,
    output: &mut dyn Processor<T>,
) -> Result<()> {
    let compare = cmp.as_ref();
    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for cursor in cursors {
        if cursor.top().is_some() {
            heap.push(HeapEntry {
                cursor,
                compare: Arc::clone(cmp),
            });
        }
    }

    while heap.len() > 1 {
        let mut entry = heap.pop().expect("heap is non-empty");
        let record = entry.cursor.pop()?.expect("heap entries are non-empty");
        output.process(record)?;

        loop {
            let Some(top) = entry.cursor.top() else { break };
            let runner_up = heap.peek().expect("heap still holds a cursor").top();
            if compare(top, runner_up) == Ordering::Greater {
                break;
            }
            let record = entry.cursor.pop()?.expect("top was just observed");
            output.process(record)?;
        }

        if entry.cursor.top().is_some() {
            heap.push(entry);
        }
    }

    // Last run standing drains without heap traffic.
    if let Some(mut entry) = heap.pop() {
        while let Some(record) = entry.cursor.pop()? {
            output.process(record)?;
        }
    }

    Ok(())
}

//! K-way merge of per-segment sorted batches into one globally-ordered
//! stream. Needed when a single compressed row's rows aren't already in
//! the scan's overall `ORDER BY` order relative to rows from other
//! segments — the row compressor only guarantees ordering *within* one
//! segment.

use crate::storage::batch::{Batch, ScanDirection};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sort key extracted from a batch's current row, comparable against
/// another batch's current-row key under the scan's configured `ORDER BY`.
pub trait SortKey: Clone {
    fn compare(&self, other: &Self) -> Ordering;
}

/// Wraps a batch slot index for the heap, with the comparator inverted
/// (`BinaryHeap` is a max-heap) so the root is the batch with the smallest
/// current row.
struct HeapEntry<K: SortKey> {
    slot: usize,
    key: K,
}

impl<K: SortKey> PartialEq for HeapEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key.compare(&other.key) == Ordering::Equal
    }
}
impl<K: SortKey> Eq for HeapEntry<K> {}

impl<K: SortKey> PartialOrd for HeapEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: SortKey> Ord for HeapEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: `BinaryHeap::pop` returns the max, and we want the min.
        other.key.compare(&self.key)
    }
}

/// A growable array of batch slots with a freelist, so removed batches'
/// indices can be reused without shifting the rest.
struct SlotArena<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> SlotArena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(value);
            idx
        } else {
            self.slots.push(Some(value));
            self.slots.len() - 1
        }
    }

    fn remove(&mut self, idx: usize) -> T {
        let value = self.slots[idx].take().expect("slot double-freed");
        self.free.push(idx);
        value
    }

    fn get(&self, idx: usize) -> &T {
        self.slots[idx].as_ref().expect("slot not occupied")
    }

    fn get_mut(&mut self, idx: usize) -> &mut T {
        self.slots[idx].as_mut().expect("slot not occupied")
    }
}

/// Merges batches that each yield rows already sorted by `K`, preserving a
/// single global order across all of them.
///
/// Correctness relies on the producer (the row compressor / segment scan)
/// emitting compressed rows in ascending order of each segment's
/// `min(order_by)`: a batch can be withheld from the heap only while its
/// minimum is strictly greater than the current root, so [`needs_next_batch`]
/// keeps admitting batches until that holds.
///
/// [`needs_next_batch`]: BatchQueueHeap::needs_next_batch
pub struct BatchQueueHeap<K: SortKey> {
    batches: SlotArena<(Batch, ScanDirection)>,
    heap: BinaryHeap<HeapEntry<K>>,
    /// Slot and push-time key of the most recently pushed batch, cleared
    /// once any row of it has been consumed via `pop()` — at that point its
    /// current minimum is no longer the one observed at push time.
    last_added: Option<(usize, K)>,
}

impl<K: SortKey> BatchQueueHeap<K> {
    pub fn new() -> Self {
        Self {
            batches: SlotArena::new(),
            heap: BinaryHeap::new(),
            last_added: None,
        }
    }

    /// Admits a newly-decompressed batch. `key_of` extracts the sort key
    /// from a batch's current row; a batch with no qualifying row (already
    /// past the end) is dropped immediately.
    pub fn push_batch(&mut self, batch: Batch, direction: ScanDirection, key_of: impl Fn(&Batch) -> Option<K>) {
        let Some(key) = key_of(&batch) else {
            return;
        };
        let slot = self.batches.insert((batch, direction));
        self.heap.push(HeapEntry { slot, key: key.clone() });
        self.last_added = Some((slot, key));
    }

    /// The current row's batch at the heap root, if any batch remains.
    pub fn top(&self) -> Option<&Batch> {
        self.heap.peek().map(|e| &self.batches.get(e.slot).0)
    }

    /// Advances the root batch by one row, re-sifting the heap (or popping
    /// it if the batch is now exhausted).
    pub fn pop(&mut self, key_of: impl Fn(&Batch) -> Option<K>) {
        let Some(top) = self.heap.pop() else { return };
        if self.last_added.as_ref().is_some_and(|(slot, _)| *slot == top.slot) {
            self.last_added = None;
        }

        let (batch, direction) = self.batches.get_mut(top.slot);
        batch.advance(*direction);
        match key_of(batch) {
            Some(key) => self.heap.push(HeapEntry { slot: top.slot, key }),
            None => {
                self.batches.remove(top.slot);
            }
        }
    }

    /// `true` iff a new batch must be pulled and pushed before `top()`/`pop()`
    /// can be trusted to yield the next row in global order: the heap is
    /// empty, there is no still-untouched last-added batch, or the
    /// last-added batch's row (as observed at push time) compares equal to
    /// the current root — a later segment might still tie or beat it and
    /// must get the chance to surface first.
    pub fn needs_next_batch(&self) -> bool {
        let Some(root) = self.heap.peek() else {
            return true;
        };
        let Some((_, last_key)) = &self.last_added else {
            return true;
        };
        last_key.compare(&root.key) == Ordering::Equal
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<K: SortKey> Default for BatchQueueHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct I64Key(pub i64);

impl SortKey for I64Key {
    fn compare(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A minimal standalone sorted-list merge exercising the same
    // heap-entry comparator and push/pop protocol as `BatchQueueHeap`,
    // without requiring a real `Batch` (which needs a compressed row).
    #[derive(Clone)]
    struct VecBatch {
        values: Vec<i64>,
        cursor: usize,
    }

    fn key_of(b: &VecBatch) -> Option<I64Key> {
        b.values.get(b.cursor).map(|v| I64Key(*v))
    }

    #[test]
    fn test_scenario_s5_two_batches_merge_in_order() {
        let a = VecBatch { values: vec![1, 4, 7], cursor: 0 };
        let b = VecBatch { values: vec![2, 3, 9], cursor: 0 };
        let mut slots = vec![a, b];
        let mut heap: BinaryHeap<HeapEntry<I64Key>> = BinaryHeap::new();
        for (slot, batch) in slots.iter().enumerate() {
            if let Some(key) = key_of(batch) {
                heap.push(HeapEntry { slot, key });
            }
        }
        let mut out = Vec::new();
        while let Some(top) = heap.pop() {
            out.push(slots[top.slot].values[slots[top.slot].cursor]);
            slots[top.slot].cursor += 1;
            if let Some(key) = key_of(&slots[top.slot]) {
                heap.push(HeapEntry { slot: top.slot, key });
            }
        }
        assert_eq!(out, vec![1, 2, 3, 4, 7, 9]);
    }

    #[test]
    fn test_heap_entry_ordering_is_inverted_for_min_heap() {
        let small = HeapEntry { slot: 0, key: I64Key(1) };
        let large = HeapEntry { slot: 1, key: I64Key(9) };
        assert_eq!(small.cmp(&large), Ordering::Greater);
    }
}

//! Priority queue
//!
//! Every factory level keeps its not-yet-emitted combinations here. Entries
//! with equal keys come out in insertion order so that a search is fully
//! deterministic for a given input.

use std::{cmp::Ordering, collections::BinaryHeap};

use serde::{Deserialize, Serialize};

/// Direction in which keys are popped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Smallest key first.
    #[default]
    Ascending,

    /// Largest key first.
    Descending,
}

#[derive(Debug)]
struct Entry<K, T> {
    key: K,
    sequence: u64,
    order: QueueOrder,
    value: T,
}

impl<K: Ord, T> Ord for Entry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_key = match self.order {
            QueueOrder::Ascending => other.key.cmp(&self.key),
            QueueOrder::Descending => self.key.cmp(&other.key),
        };

        by_key.then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<K: Ord, T> PartialOrd for Entry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> PartialEq for Entry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, T> Eq for Entry<K, T> {}

/// Binary heap keyed by `K`, popping in the configured order.
#[derive(Debug)]
pub struct PriorityQueue<K, T> {
    heap: BinaryHeap<Entry<K, T>>,
    order: QueueOrder,
    sequence: u64,
}

impl<K: Ord, T> PriorityQueue<K, T> {
    /// Creates an empty queue
    pub fn new(order: QueueOrder) -> Self {
        PriorityQueue {
            heap: BinaryHeap::new(),
            order,
            sequence: 0,
        }
    }

    /// Inserts a value
    pub fn push(&mut self, key: K, value: T) {
        self.sequence += 1;

        self.heap.push(Entry {
            key,
            sequence: self.sequence,
            order: self.order,
            value,
        });
    }

    /// Removes the next value
    pub fn pop(&mut self) -> Option<(K, T)> {
        self.heap.pop().map(|entry| (entry.key, entry.value))
    }

    /// Next value without removing it
    pub fn peek(&self) -> Option<(&K, &T)> {
        self.heap.peek().map(|entry| (&entry.key, &entry.value))
    }

    /// Pending values in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|entry| &entry.value)
    }

    /// Number of pending values
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every pending value
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_smallest_first() {
        let mut queue = PriorityQueue::new(QueueOrder::Ascending);

        queue.push(300, "c");
        queue.push(100, "a");
        queue.push(200, "b");

        assert_eq!(queue.peek(), Some((&100, &"a")));
        assert_eq!(queue.pop(), Some((100, "a")));
        assert_eq!(queue.pop(), Some((200, "b")));
        assert_eq!(queue.pop(), Some((300, "c")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn descending_pops_largest_first() {
        let mut queue = PriorityQueue::new(QueueOrder::Descending);

        queue.push(1, ());
        queue.push(3, ());
        queue.push(2, ());

        let keys: Vec<_> = std::iter::from_fn(|| queue.pop().map(|(key, ())| key)).collect();

        assert_eq!(keys, vec![3, 2, 1]);
    }

    #[test]
    fn equal_keys_pop_in_insertion_order() {
        let mut queue = PriorityQueue::new(QueueOrder::Ascending);

        queue.push(5, "first");
        queue.push(5, "second");
        queue.push(5, "third");

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().map(|(_, value)| value), Some("first"));
        assert_eq!(queue.pop().map(|(_, value)| value), Some("second"));

        queue.clear();

        assert!(queue.is_empty());
    }
}

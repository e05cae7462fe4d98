//! K-way merge of per-partition results.
//!
//! Each partition is already ordered by sort key in the requested direction.
//! The merge keeps one head per partition in a binary heap, so merging `n`
//! items from `k` partitions costs `O(n log k)`.
//!
//! Ties on the sort key are broken by partition position, then by position
//! within the partition. The output therefore depends only on the partition
//! contents and their order, never on which read finished first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::storage::Direction;

struct Head<T> {
    key: String,
    partition: usize,
    item: T,
    direction: Direction,
}

impl<T> PartialEq for Head<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Head<T> {}

impl<T> PartialOrd for Head<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Head<T> {
    // BinaryHeap pops the greatest element: "greatest" is whichever head comes
    // next in the output.
    fn cmp(&self, other: &Self) -> Ordering {
        self.direction
            .apply(other.key.cmp(&self.key))
            .then_with(|| other.partition.cmp(&self.partition))
    }
}

/// Merges sorted partitions into one sequence ordered by `sort_key`.
///
/// Stops after `limit` items when given.
///
/// # Examples
///
/// ```
/// use tablekit_core::merge::merge_sorted;
/// use tablekit_core::storage::Direction;
///
/// let merged = merge_sorted(
///     vec![vec!["E#9", "E#3"], vec!["E#8", "E#1"]],
///     Direction::Descending,
///     None,
///     |key| key.to_string(),
/// );
/// assert_eq!(merged, vec!["E#9", "E#8", "E#3", "E#1"]);
/// ```
pub fn merge_sorted<T, F>(
    partitions: Vec<Vec<T>>,
    direction: Direction,
    limit: Option<usize>,
    sort_key: F,
) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let total: usize = partitions.iter().map(Vec::len).sum();
    let capacity = limit.map_or(total, |limit| limit.min(total));
    let mut merged = Vec::with_capacity(capacity);

    let mut iters: Vec<_> = partitions.into_iter().map(Vec::into_iter).collect();
    let mut heap = BinaryHeap::with_capacity(iters.len());

    for (partition, iter) in iters.iter_mut().enumerate() {
        if let Some(item) = iter.next() {
            heap.push(Head {
                key: sort_key(&item),
                partition,
                item,
                direction,
            });
        }
    }

    while merged.len() < capacity {
        let Some(head) = heap.pop() else {
            break;
        };
        if let Some(next) = iters[head.partition].next() {
            heap.push(Head {
                key: sort_key(&next),
                partition: head.partition,
                item: next,
                direction,
            });
        }
        merged.push(head.item);
    }

    merged
}

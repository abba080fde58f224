//! Change ordering.
//!
//! Sorts a batch of changes so that structural dependencies are respected
//! when the batch is replayed against the other side:
//!
//! - a directory move or creation is applied before any operation on its
//!   descendants (containment precedence)
//! - a rename chain `a -> b`, `b -> c` is applied in chain order: the
//!   change whose destination is another change's source goes first
//! - a move to a path is applied before a non-move change at that path
//! - additions and content updates unrelated to any move go before
//!   structural moves and deletions; remaining ties keep original batch
//!   order
//!
//! The ordering is computed as a dependency graph over path relationships
//! followed by a topological traversal, not with a pairwise comparator: a
//! comparator cannot express these rules transitively and risks an
//! inconsistent order on large batches. A genuine dependency cycle (which
//! single-filesystem semantics should never produce) is broken by
//! insertion order; sorting always terminates.

use crate::change::Change;
use crate::metadata::record_id;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Reorders `changes` in place into a replay-safe total order.
pub fn sort(changes: &mut Vec<Change>) {
    let n = changes.len();
    if n < 2 {
        return;
    }

    let dest_keys: Vec<String> = changes
        .iter()
        .map(|c| record_id(c.path()).as_str().to_string())
        .collect();
    let src_keys: Vec<Option<String>> = changes
        .iter()
        .map(|c| c.source_path().map(|p| record_id(p).as_str().to_string()))
        .collect();

    let mut by_dest: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, key) in dest_keys.iter().enumerate() {
        by_dest.entry(key.as_str()).or_default().push(i);
    }

    // Edges (i, j) mean: change i must be applied before change j.
    let mut edges: HashSet<(usize, usize)> = HashSet::new();

    for j in 0..n {
        // Chain precedence: whoever targets our source goes first.
        if let Some(src) = &src_keys[j] {
            if let Some(is) = by_dest.get(src.as_str()) {
                for &i in is {
                    if i != j {
                        edges.insert((i, j));
                    }
                }
            }
        }

        // Containment precedence: a change whose destination is a strict
        // ancestor of our source or destination goes first.
        for key in [Some(&dest_keys[j]), src_keys[j].as_ref()]
            .into_iter()
            .flatten()
        {
            for ancestor in ancestors(key) {
                if let Some(is) = by_dest.get(ancestor) {
                    for &i in is {
                        if i != j {
                            edges.insert((i, j));
                        }
                    }
                }
            }
        }

        // Destination collision: a move claiming our exact path goes first.
        if !changes[j].is_move() {
            if let Some(is) = by_dest.get(dest_keys[j].as_str()) {
                for &i in is {
                    if i != j && changes[i].is_move() {
                        edges.insert((i, j));
                    }
                }
            }
        }
    }

    let mut adjacent = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for &(i, j) in &edges {
        adjacent[i].push(j);
        indegree[j] += 1;
    }

    // Ready changes are picked by (class, insertion index): non-structural
    // changes (additions, updates) first, then original batch order.
    // Deletions rank with moves so a vacating move is not overtaken.
    let class = |c: &Change| usize::from(c.is_move() || c.is_deletion());

    let mut heap: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
    for i in 0..n {
        if indegree[i] == 0 {
            heap.push(Reverse((class(&changes[i]), i)));
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut emitted = vec![false; n];
    while order.len() < n {
        let i = match heap.pop() {
            Some(Reverse((_, i))) => i,
            // Cycle: fall back to the earliest unemitted change.
            None => match (0..n).find(|&i| !emitted[i]) {
                Some(i) => i,
                None => break,
            },
        };
        if emitted[i] {
            continue;
        }
        emitted[i] = true;
        order.push(i);
        for &k in &adjacent[i] {
            if emitted[k] {
                continue;
            }
            indegree[k] = indegree[k].saturating_sub(1);
            if indegree[k] == 0 {
                heap.push(Reverse((class(&changes[k]), k)));
            }
        }
    }

    let mut sorted = Vec::with_capacity(n);
    for i in order {
        sorted.push(changes[i].clone());
    }
    *changes = sorted;
}

/// Iterates over the strict path-component ancestors of a normalized key.
fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/').map(move |(pos, _)| &key[..pos])
}

//! Nested-set numbering for the branch tree.
//!
//! Every scoped permission check compares lft/rght bounds, so the numbering
//! must never be partially updated. Instead of patching bounds in place on
//! each mutation, the whole tree is renumbered from parent adjacency inside
//! the mutating transaction; this module holds the pure numbering function.

use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// A node as read from the branches table, in sibling order.
#[derive(Debug, Clone)]
pub struct AdjacencyRow {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
}

/// Freshly computed bounds for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedNode {
    pub id: Uuid,
    pub lft: i32,
    pub rght: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("branch {child} references unknown parent {parent}")]
    UnknownParent { child: Uuid, parent: Uuid },
    #[error("{count} branches unreachable from any root (cycle in parent pointers)")]
    Unreachable { count: usize },
}

/// Assign nested-set bounds to every node from parent adjacency.
///
/// Roots (and siblings under one parent) keep the order they appear in
/// `rows`. The numbering is continuous across roots, so the result is a
/// valid nested-set forest. Fails if any parent pointer leaves the row set
/// or forms a cycle; the caller must abort the transaction in that case.
pub fn number_tree(rows: &[AdjacencyRow]) -> Result<Vec<NumberedNode>, TreeError> {
    let known: HashMap<Uuid, ()> = rows.iter().map(|r| (r.id, ())).collect();
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut roots: Vec<Uuid> = Vec::new();

    for row in rows {
        match row.parent_id {
            None => roots.push(row.id),
            Some(parent) => {
                if !known.contains_key(&parent) {
                    return Err(TreeError::UnknownParent {
                        child: row.id,
                        parent,
                    });
                }
                children.entry(parent).or_default().push(row.id);
            }
        }
    }

    let mut result = Vec::with_capacity(rows.len());
    let mut counter: i32 = 1;
    for root in &roots {
        counter = assign(*root, counter, &children, &mut result);
    }

    if result.len() != rows.len() {
        return Err(TreeError::Unreachable {
            count: rows.len() - result.len(),
        });
    }

    Ok(result)
}

/// Iterative DFS; returns the next free counter value.
fn assign(
    root: Uuid,
    mut counter: i32,
    children: &HashMap<Uuid, Vec<Uuid>>,
    result: &mut Vec<NumberedNode>,
) -> i32 {
    // (node, slot in result) pairs still waiting for their rght bound.
    let mut stack: Vec<(Uuid, usize, usize)> = Vec::new();
    stack.push((root, result.len(), 0));
    result.push(NumberedNode {
        id: root,
        lft: counter,
        rght: 0,
    });
    counter += 1;

    while let Some((node, slot, next_child)) = stack.pop() {
        let kids = children.get(&node).map(|v| v.as_slice()).unwrap_or(&[]);
        if next_child < kids.len() {
            stack.push((node, slot, next_child + 1));
            let child = kids[next_child];
            stack.push((child, result.len(), 0));
            result.push(NumberedNode {
                id: child,
                lft: counter,
                rght: 0,
            });
            counter += 1;
        } else {
            result[slot].rght = counter;
            counter += 1;
        }
    }

    counter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, parent: Option<Uuid>) -> AdjacencyRow {
        AdjacencyRow { id, parent_id: parent }
    }

    fn bounds_of(numbered: &[NumberedNode], id: Uuid) -> (i32, i32) {
        let n = numbered.iter().find(|n| n.id == id).unwrap();
        (n.lft, n.rght)
    }

    #[test]
    fn test_single_root() {
        let root = Uuid::new_v4();
        let numbered = number_tree(&[row(root, None)]).unwrap();
        assert_eq!(numbered, vec![NumberedNode { id: root, lft: 1, rght: 2 }]);
    }

    #[test]
    fn test_kingdom_barony_shire_chain() {
        let kingdom = Uuid::new_v4();
        let barony = Uuid::new_v4();
        let shire = Uuid::new_v4();
        let numbered = number_tree(&[
            row(kingdom, None),
            row(barony, Some(kingdom)),
            row(shire, Some(barony)),
        ])
        .unwrap();

        assert_eq!(bounds_of(&numbered, kingdom), (1, 6));
        assert_eq!(bounds_of(&numbered, barony), (2, 5));
        assert_eq!(bounds_of(&numbered, shire), (3, 4));
    }

    #[test]
    fn test_siblings_keep_input_order() {
        let kingdom = Uuid::new_v4();
        let east = Uuid::new_v4();
        let west = Uuid::new_v4();
        let numbered = number_tree(&[
            row(kingdom, None),
            row(east, Some(kingdom)),
            row(west, Some(kingdom)),
        ])
        .unwrap();

        assert_eq!(bounds_of(&numbered, kingdom), (1, 6));
        assert_eq!(bounds_of(&numbered, east), (2, 3));
        assert_eq!(bounds_of(&numbered, west), (4, 5));
    }

    #[test]
    fn test_forest_numbering_is_continuous() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let b_child = Uuid::new_v4();
        let numbered = number_tree(&[row(a, None), row(b, None), row(b_child, Some(b))]).unwrap();

        assert_eq!(bounds_of(&numbered, a), (1, 2));
        assert_eq!(bounds_of(&numbered, b), (3, 6));
        assert_eq!(bounds_of(&numbered, b_child), (4, 5));
    }

    #[test]
    fn test_child_ranges_nest_within_parent() {
        // A three-level tree with fan-out; every child range must sit
        // strictly inside its parent's range.
        let root = Uuid::new_v4();
        let mids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut rows = vec![row(root, None)];
        let mut leaves = Vec::new();
        for mid in &mids {
            rows.push(row(*mid, Some(root)));
            for _ in 0..2 {
                let leaf = Uuid::new_v4();
                rows.push(row(leaf, Some(*mid)));
                leaves.push((*mid, leaf));
            }
        }
        let numbered = number_tree(&rows).unwrap();

        let (root_l, root_r) = bounds_of(&numbered, root);
        assert_eq!(root_l, 1);
        assert_eq!(root_r, rows.len() as i32 * 2);
        for mid in &mids {
            let (l, r) = bounds_of(&numbered, *mid);
            assert!(l < r);
            assert!(root_l < l && r < root_r);
        }
        for (mid, leaf) in &leaves {
            let (ml, mr) = bounds_of(&numbered, *mid);
            let (ll, lr) = bounds_of(&numbered, *leaf);
            assert!(ml < ll && lr < mr);
        }
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let child = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let err = number_tree(&[row(child, Some(ghost))]).unwrap_err();
        assert_eq!(err, TreeError::UnknownParent { child, parent: ghost });
    }

    #[test]
    fn test_cycle_rejected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let err = number_tree(&[row(a, Some(b)), row(b, Some(a))]).unwrap_err();
        assert_eq!(err, TreeError::Unreachable { count: 2 });
    }

    #[test]
    fn test_deep_chain_does_not_overflow_stack() {
        let mut rows = Vec::new();
        let mut parent = None;
        for _ in 0..10_000 {
            let id = Uuid::new_v4();
            rows.push(row(id, parent));
            parent = Some(id);
        }
        let numbered = number_tree(&rows).unwrap();
        assert_eq!(numbered.len(), 10_000);
        assert_eq!(bounds_of(&numbered, rows[0].id), (1, 20_000));
    }
}

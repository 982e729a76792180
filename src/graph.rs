//! Dependency graph algorithms over a single project's tickets.
//!
//! These functions are pure: they take the tickets as loaded from storage and
//! never touch the database. [`crate::Store`] calls them inside a transaction
//! so the checked state is the state that gets written.

use crate::types::{DependencySet, Ticket};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Adjacency in the "depends on" direction, keyed by display index.
pub type Adjacency = BTreeMap<u32, DependencySet>;

/// Build the adjacency for a project, replacing `ticket`'s edges with `proposed`.
pub fn candidate_adjacency(tickets: &[Ticket], ticket: u32, proposed: &DependencySet) -> Adjacency {
    let mut adjacency: Adjacency = tickets.iter().map(|t| (t.num, t.depends_on.clone())).collect();
    adjacency.insert(ticket, proposed.clone());
    adjacency
}

/// Depth-first search from `start` over the dependency edges.
///
/// Returns the ticket whose edge closes a cycle, i.e. the node found again
/// while it is still on the active DFS stack. Edges to indices missing from
/// the adjacency are ignored.
pub fn find_cycle(adjacency: &Adjacency, start: u32) -> Option<u32> {
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();

    // Explicit stack of (node, remaining children) frames
    let mut stack: Vec<(u32, Vec<u32>)> = Vec::new();
    visited.insert(start);
    on_stack.insert(start);
    stack.push((start, children(adjacency, start)));

    while let Some((node, pending)) = stack.last_mut() {
        let node = *node;
        match pending.pop() {
            Some(next) if on_stack.contains(&next) => return Some(node),
            Some(next) => {
                if visited.insert(next) {
                    on_stack.insert(next);
                    stack.push((next, children(adjacency, next)));
                }
            }
            None => {
                on_stack.remove(&node);
                stack.pop();
            }
        }
    }

    None
}

fn children(adjacency: &Adjacency, node: u32) -> Vec<u32> {
    adjacency
        .get(&node)
        .map(|deps| deps.iter().filter(|d| adjacency.contains_key(d)).rev().collect())
        .unwrap_or_default()
}

/// Dependencies of `ticket` that still hold it back.
///
/// A dependency is satisfied when it refers to a done or skipped ticket, or to
/// a ticket that no longer exists.
pub fn unsatisfied_dependencies(ticket: &Ticket, tickets: &[Ticket]) -> Vec<u32> {
    let by_num: HashMap<u32, &Ticket> = tickets.iter().map(|t| (t.num, t)).collect();
    unsatisfied_in(ticket, &by_num)
}

fn unsatisfied_in(ticket: &Ticket, by_num: &HashMap<u32, &Ticket>) -> Vec<u32> {
    ticket
        .depends_on
        .iter()
        .filter(|dep| by_num.get(dep).is_some_and(|t| !t.status.is_terminal()))
        .collect()
}

/// Non-terminal tickets whose dependencies are all satisfied, by display index.
pub fn unblocked(tickets: &[Ticket]) -> Vec<Ticket> {
    let by_num: HashMap<u32, &Ticket> = tickets.iter().map(|t| (t.num, t)).collect();
    let mut out: Vec<Ticket> = tickets
        .iter()
        .filter(|t| !t.status.is_terminal())
        .filter(|t| unsatisfied_in(t, &by_num).is_empty())
        .cloned()
        .collect();
    out.sort_by_key(|t| t.num);
    out
}

/// True when no ticket is pending or in progress.
pub fn all_terminal(tickets: &[Ticket]) -> bool {
    tickets.iter().all(|t| t.status.is_terminal())
}

//! Post-dominators and control dependences over the traced instructions
//!
//! Post-dominators are dominators of the reversed graph, rooted at a virtual exit that every
//! return (and every instruction without successors) flows into. Instructions which can't reach
//! any exit (infinite loops) get an extra edge to the virtual exit so that every node is in the
//! tree.

use std::collections::{BTreeMap, BTreeSet};

/// Control flow graph, from each node to its successors
pub type Graph = BTreeMap<usize, BTreeSet<usize>>;

/// Immediate post-dominator of each node (`None` for the virtual exit)
pub type PostDominators = BTreeMap<usize, Option<usize>>;

pub fn post_dominators(graph: &Graph) -> PostDominators {
    let nodes: Vec<usize> = graph.keys().copied().collect();
    let index_of: BTreeMap<usize, usize> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();
    let exit = nodes.len();

    let mut successors: Vec<Vec<usize>> = vec![vec![]; exit + 1];
    let mut predecessors: Vec<Vec<usize>> = vec![vec![]; exit + 1];
    for (index, node) in nodes.iter().enumerate() {
        for target in &graph[node] {
            if let Some(target) = index_of.get(target) {
                successors[index].push(*target);
                predecessors[*target].push(index);
            }
        }
        if successors[index].is_empty() {
            successors[index].push(exit);
            predecessors[exit].push(index);
        }
    }

    // Connect nodes that can't reach an exit, starting from the last one in code order
    let mut reaches_exit = vec![false; exit + 1];
    mark_reverse_reachable(exit, &predecessors, &mut reaches_exit);
    while let Some(stuck) = (0..exit).rev().find(|node| !reaches_exit[*node]) {
        successors[stuck].push(exit);
        predecessors[exit].push(stuck);
        mark_reverse_reachable(stuck, &predecessors, &mut reaches_exit);
    }

    // Postorder of the reversed graph, from the exit
    let mut postorder_number = vec![0; exit + 1];
    let mut postorder = Vec::with_capacity(exit + 1);
    let mut visited = vec![false; exit + 1];
    let mut stack: Vec<(usize, usize)> = vec![(exit, 0)];
    visited[exit] = true;
    while let Some((node, child)) = stack.pop() {
        if let Some(next) = predecessors[node].get(child).copied() {
            stack.push((node, child + 1));
            if !visited[next] {
                visited[next] = true;
                stack.push((next, 0));
            }
        } else {
            postorder_number[node] = postorder.len();
            postorder.push(node);
        }
    }

    // Cooper, Harvey, and Kennedy's iterative dominator algorithm
    let mut immediate: Vec<Option<usize>> = vec![None; exit + 1];
    immediate[exit] = Some(exit);
    let mut changed = true;
    while changed {
        changed = false;
        for node in postorder.iter().rev().copied().filter(|node| *node != exit) {
            let mut new_immediate: Option<usize> = None;
            for successor in &successors[node] {
                if immediate[*successor].is_none() {
                    continue;
                }
                new_immediate = match new_immediate {
                    None => Some(*successor),
                    Some(current) => {
                        intersect(*successor, current, &immediate, &postorder_number)
                    }
                };
            }
            if new_immediate.is_some() && new_immediate != immediate[node] {
                immediate[node] = new_immediate;
                changed = true;
            }
        }
    }

    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let post_dominator = immediate[index]
                .filter(|post_dominator| *post_dominator != exit)
                .map(|post_dominator| nodes[post_dominator]);
            (*node, post_dominator)
        })
        .collect()
}

fn mark_reverse_reachable(from: usize, predecessors: &[Vec<usize>], reached: &mut [bool]) {
    let mut to_visit = vec![from];
    reached[from] = true;
    while let Some(node) = to_visit.pop() {
        for predecessor in &predecessors[node] {
            if !reached[*predecessor] {
                reached[*predecessor] = true;
                to_visit.push(*predecessor);
            }
        }
    }
}

fn intersect(
    mut left: usize,
    mut right: usize,
    immediate: &[Option<usize>],
    postorder_number: &[usize],
) -> Option<usize> {
    while left != right {
        while postorder_number[left] < postorder_number[right] {
            left = immediate[left]?;
        }
        while postorder_number[right] < postorder_number[left] {
            right = immediate[right]?;
        }
    }
    Some(left)
}

/// Branches each node is control dependent on
///
/// A node depends on a branch if one edge out of the branch always leads to the node while
/// another edge can avoid it.
pub fn control_dependences(graph: &Graph) -> BTreeMap<usize, BTreeSet<usize>> {
    let post_dominators = post_dominators(graph);
    let mut dependences: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

    for (branch, targets) in graph {
        let stop = post_dominators.get(branch).copied().flatten();
        for target in targets {
            let mut runner = Some(*target).filter(|target| post_dominators.contains_key(target));
            while runner != stop {
                let node = match runner {
                    Some(node) => node,
                    None => break,
                };
                dependences.entry(node).or_default().insert(*branch);
                runner = post_dominators.get(&node).copied().flatten();
            }
        }
    }

    dependences
}

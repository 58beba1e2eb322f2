//! Closure policies over the (included, boundary) pair

use tracing::debug;

use crate::domain::ClosurePolicy;
use crate::graph::TaskGraph;

/// Edges `(task, dependency)` with the task included and the dependency not
pub(crate) fn boundary_edges(graph: &TaskGraph, included: &[bool]) -> Vec<(usize, usize)> {
    (0..graph.len())
        .filter(|&task| included[task])
        .flat_map(|task| {
            graph
                .deps(task)
                .iter()
                .filter(move |&&dep| !included[dep])
                .map(move |&dep| (task, dep))
        })
        .collect()
}

/// Apply the policy to `included`
///
/// Strict leaves `included` untouched and returns the boundary if it is not
/// empty. Expand grows `included` until the boundary is empty and returns the
/// nodes it added, in the order they were added.
pub(crate) fn close(
    graph: &TaskGraph,
    included: &mut [bool],
    policy: ClosurePolicy,
) -> Result<Vec<usize>, Vec<(usize, usize)>> {
    match policy {
        ClosurePolicy::Strict => {
            let boundary = boundary_edges(graph, included);
            if boundary.is_empty() { Ok(Vec::new()) } else { Err(boundary) }
        }
        ClosurePolicy::Expand => Ok(expand(graph, included)),
    }
}

fn expand(graph: &TaskGraph, included: &mut [bool]) -> Vec<usize> {
    let mut added = Vec::new();
    // Each round adds at least one node, so |V| rounds always reach the fixed point
    for round in 0..graph.len() {
        let boundary = boundary_edges(graph, included);
        if boundary.is_empty() {
            debug!(round, added = added.len(), "expand: closed");
            break;
        }
        for (_, dep) in boundary {
            if !included[dep] {
                included[dep] = true;
                added.push(dep);
            }
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_edges() {
        // 1 -> 0, 2 -> 1
        let graph = TaskGraph::from_edges(3, &[(1, 0), (2, 1)]);
        assert_eq!(boundary_edges(&graph, &[false, true, true]), vec![(1, 0)]);
        assert!(boundary_edges(&graph, &[true, true, false]).is_empty());
    }

    #[test]
    fn test_strict_reports_boundary() {
        let graph = TaskGraph::from_edges(3, &[(1, 0), (2, 1)]);
        let mut included = vec![false, true, true];
        assert_eq!(close(&graph, &mut included, ClosurePolicy::Strict), Err(vec![(1, 0)]));
        assert_eq!(included, vec![false, true, true]);
    }

    #[test]
    fn test_expand_reaches_fixed_point_over_rounds() {
        // chain 3 -> 2 -> 1 -> 0, only the tail selected
        let graph = TaskGraph::from_edges(4, &[(1, 0), (2, 1), (3, 2)]);
        let mut included = vec![false, false, false, true];
        let added = close(&graph, &mut included, ClosurePolicy::Expand).unwrap();
        assert_eq!(added, vec![2, 1, 0]);
        assert!(included.iter().all(|&i| i));
    }

    #[test]
    fn test_expand_on_closed_selection_adds_nothing() {
        let graph = TaskGraph::from_edges(2, &[(1, 0)]);
        let mut included = vec![true, false];
        assert_eq!(close(&graph, &mut included, ClosurePolicy::Expand), Ok(vec![]));
    }
}

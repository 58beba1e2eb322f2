//! Index-based dependency arena

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

use crate::domain::TemplateSet;
use crate::error::StructuralError;

/// DFS marking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Dependency graph over the tasks of one template set
///
/// Node `i` is `set.tasks[i]`. `deps(i)` are the tasks `i` waits for,
/// `dependents(i)` the tasks waiting for `i`. Both are sorted and deduplicated.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Build the graph, failing on the first edge with an endpoint outside the set
    pub fn build(set: &TemplateSet) -> Result<Self, StructuralError> {
        let (graph, issues) = Self::build_lenient(set);
        match issues.into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(graph),
        }
    }

    /// Build the graph from every resolvable edge and report the rest
    pub fn build_lenient(set: &TemplateSet) -> (Self, Vec<StructuralError>) {
        debug!(code = %set.code, tasks = set.tasks.len(), edges = set.dependencies.len(), "TaskGraph::build: called");
        let index: HashMap<&str, usize> = set.tasks.iter().enumerate().map(|(i, t)| (t.id.as_str(), i)).collect();
        let n = set.tasks.len();
        let mut graph = Self {
            deps: vec![Vec::new(); n],
            dependents: vec![Vec::new(); n],
        };
        let mut issues = Vec::new();

        for edge in &set.dependencies {
            let task = index.get(edge.task_id.as_str()).copied();
            let dep = index.get(edge.depends_on_task_id.as_str()).copied();
            let foreign = edge.set_id != set.id;
            match (task, dep) {
                (Some(t), Some(d)) if !foreign => graph.add_edge(t, d),
                (Some(t), Some(_)) => issues.push(StructuralError::DanglingEdge {
                    task: set.tasks[t].code.clone(),
                    missing_ref: format!("{}/{}", edge.set_id, edge.depends_on_task_id),
                }),
                (Some(t), None) => issues.push(StructuralError::DanglingEdge {
                    task: set.tasks[t].code.clone(),
                    missing_ref: edge.depends_on_task_id.clone(),
                }),
                (None, _) => issues.push(StructuralError::DanglingEdge {
                    task: edge.task_id.clone(),
                    missing_ref: edge.task_id.clone(),
                }),
            }
        }

        for list in graph.deps.iter_mut().chain(graph.dependents.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        (graph, issues)
    }

    /// Graph with `n` nodes and the given `(task, depends_on)` index pairs
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = Self {
            deps: vec![Vec::new(); n],
            dependents: vec![Vec::new(); n],
        };
        for &(task, dep) in edges {
            if task < n && dep < n {
                graph.add_edge(task, dep);
            }
        }
        for list in graph.deps.iter_mut().chain(graph.dependents.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }
        graph
    }

    fn add_edge(&mut self, task: usize, depends_on: usize) {
        self.deps[task].push(depends_on);
        self.dependents[depends_on].push(task);
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn deps(&self, node: usize) -> &[usize] {
        &self.deps[node]
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    pub fn edge_count(&self) -> usize {
        self.deps.iter().map(Vec::len).sum()
    }

    /// Find a dependency cycle, if any
    ///
    /// Iterative three-state DFS in node order. The returned path follows
    /// dependency direction and repeats its first node at the end
    /// (`[a, b, a]` means a waits for b, b waits for a).
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        let n = self.len();
        let mut marks = vec![Mark::Unvisited; n];
        // (node, next dependency position)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match self.deps[node].get(frame.1).copied() {
                    Some(dep) => {
                        frame.1 += 1;
                        match marks[dep] {
                            Mark::Unvisited => {
                                marks[dep] = Mark::InProgress;
                                stack.push((dep, 0));
                            }
                            Mark::InProgress => {
                                let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                                let mut path: Vec<usize> = stack[start..].iter().map(|&(n, _)| n).collect();
                                path.push(dep);
                                debug!(?path, "find_cycle: cycle found");
                                return Some(path);
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Topological order of the included nodes, dependencies first
    ///
    /// Among nodes that are ready at the same time the lowest `rank` goes
    /// first, which makes the order fully deterministic. Only edges between
    /// included nodes are considered. Nodes on a cycle are left out, so a
    /// result shorter than the included count means the subgraph is cyclic.
    pub fn topological_order(&self, included: &[bool], rank: &[usize]) -> Vec<usize> {
        let n = self.len();
        let mut pending = vec![0usize; n];
        let mut ready = BinaryHeap::new();

        for node in 0..n {
            if !included[node] {
                continue;
            }
            pending[node] = self.deps[node].iter().filter(|&&d| included[d]).count();
            if pending[node] == 0 {
                ready.push(Reverse((rank[node], node)));
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                if !included[dependent] {
                    continue;
                }
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse((rank[dependent], dependent)));
                }
            }
        }

        order
    }
}

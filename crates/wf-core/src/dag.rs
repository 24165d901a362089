//! Task graph construction and traversal

use crate::error::{CoreError, CoreResult};
use crate::operator::Operator;
use crate::task_name::TaskName;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Accumulates operators and edges; [`build`](Self::build) validates them
/// into an immutable [`TaskGraph`].
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    operators: Vec<Operator>,
    edges: Vec<(String, String)>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator as a node
    pub fn add_node(&mut self, operator: Operator) -> &mut Self {
        self.operators.push(operator);
        self
    }

    /// `from` must complete successfully before `to` starts
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    /// Validate operators and edges and freeze the graph.
    ///
    /// Fails on duplicate task names, invalid operator configuration, edges
    /// naming unregistered tasks, and cycles.
    pub fn build(self) -> CoreResult<TaskGraph> {
        let mut graph: DiGraph<Operator, ()> = DiGraph::new();
        let mut node_map: HashMap<TaskName, NodeIndex> = HashMap::new();

        for operator in self.operators {
            if node_map.contains_key(&operator.name) {
                return Err(CoreError::DuplicateTask {
                    name: operator.name.to_string(),
                });
            }
            operator.validate()?;
            let name = operator.name.clone();
            let idx = graph.add_node(operator);
            node_map.insert(name, idx);
        }

        for (from, to) in &self.edges {
            let lookup = |name: &str| {
                node_map
                    .get(name)
                    .copied()
                    .ok_or_else(|| CoreError::DanglingEdge {
                        from: from.clone(),
                        to: to.clone(),
                        missing: name.to_string(),
                    })
            };
            let from_idx = lookup(from)?;
            let to_idx = lookup(to)?;
            graph.update_edge(from_idx, to_idx, ());
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                return Err(CoreError::CyclicGraph {
                    cycle: find_cycle_path(&graph, cycle.node_id()),
                })
            }
        };

        Ok(TaskGraph {
            graph,
            node_map,
            order,
        })
    }
}

/// Render the cycle through `start` as `a -> b -> a`.
///
/// Breadth-first search along outgoing edges until an edge leads back to
/// `start`, then walk the parent links.
fn find_cycle_path(graph: &DiGraph<Operator, ()>, start: NodeIndex) -> String {
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);
    let mut closing = None;

    'search: while let Some(current) = queue.pop_front() {
        for edge in graph.edges_directed(current, Direction::Outgoing) {
            let next = edge.target();
            if next == start {
                closing = Some(current);
                break 'search;
            }
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    let mut path = vec![graph[start].name.to_string()];
    if let Some(mut node) = closing {
        let mut tail = Vec::new();
        while node != start {
            tail.push(graph[node].name.to_string());
            match parent.get(&node) {
                Some(&p) => node = p,
                None => break,
            }
        }
        tail.reverse();
        path.extend(tail);
        path.push(graph[start].name.to_string());
    }
    path.join(" -> ")
}

/// An immutable, acyclic graph of operators.
///
/// Edges point from predecessor to successor. Listing methods return names in
/// registration order so scheduling is deterministic for a given manifest.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<Operator, ()>,
    node_map: HashMap<TaskName, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl TaskGraph {
    /// Number of tasks
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Look up an operator by task name
    pub fn operator(&self, name: &str) -> Option<&Operator> {
        self.node_map.get(name).map(|&idx| &self.graph[idx])
    }

    /// All task names in registration order
    pub fn names(&self) -> Vec<TaskName> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].name.clone())
            .collect()
    }

    /// Tasks with no predecessors
    pub fn roots(&self) -> Vec<TaskName> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].name.clone())
            .collect()
    }

    /// Direct successors of a task
    pub fn successors_of(&self, name: &str) -> Vec<TaskName> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Direct predecessors of a task
    pub fn predecessors_of(&self, name: &str) -> Vec<TaskName> {
        self.neighbors(name, Direction::Incoming)
    }

    /// All transitive successors of a task
    pub fn descendants(&self, name: &str) -> Vec<TaskName> {
        let Some(&start) = self.node_map.get(name) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                let next = edge.target();
                if visited.insert(next) {
                    result.push(next);
                    stack.push(next);
                }
            }
        }
        result.sort();
        result
            .into_iter()
            .map(|idx| self.graph[idx].name.clone())
            .collect()
    }

    /// Tasks ordered so every predecessor precedes its successors
    pub fn topological_order(&self) -> Vec<TaskName> {
        self.order
            .iter()
            .map(|&idx| self.graph[idx].name.clone())
            .collect()
    }

    /// Every edge as `(predecessor, successor)`
    pub fn edges(&self) -> Vec<(TaskName, TaskName)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].name.clone(),
                    self.graph[e.target()].name.clone(),
                )
            })
            .collect()
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<TaskName> {
        let Some(&idx) = self.node_map.get(name) else {
            return Vec::new();
        };
        let mut neighbors: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Incoming => e.source(),
                Direction::Outgoing => e.target(),
            })
            .collect();
        neighbors.sort();
        neighbors
            .into_iter()
            .map(|n| self.graph[n].name.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;

// src/dag/graph.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::task_graph::TaskGraph;
use crate::errors::{Result, SitepipeError};
use crate::tasks::Task;

/// Index of a leaf occurrence in a lowered graph.
pub type NodeId = usize;

/// Internal node structure: the leaf plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: Task,
    /// Nodes that must complete before this one can run.
    deps: Vec<NodeId>,
    /// Nodes that wait on this one.
    dependents: Vec<NodeId>,
}

/// A [`TaskGraph`] lowered to explicit dependency edges.
///
/// Every leaf occurrence becomes one node. `sequence(a, b)` adds an edge from
/// every sink of `a` to every source of `b`; `parallel` adds no edges between
/// its children.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: Vec<DagNode>,
}

impl DagGraph {
    /// Lower `graph` and check that the result is acyclic.
    pub fn lower(graph: &TaskGraph) -> Result<Self> {
        let mut dag = Self { nodes: Vec::new() };
        dag.lower_into(graph, &[]);
        dag.validate_acyclic()?;
        Ok(dag)
    }

    /// Add `graph` so that its sources depend on `preds`; returns its sinks.
    fn lower_into(&mut self, graph: &TaskGraph, preds: &[NodeId]) -> Vec<NodeId> {
        match graph {
            TaskGraph::Leaf(task) => {
                let id = self.nodes.len();
                self.nodes.push(DagNode {
                    task: task.clone(),
                    deps: preds.to_vec(),
                    dependents: Vec::new(),
                });
                for &pred in preds {
                    self.nodes[pred].dependents.push(id);
                }
                vec![id]
            }
            TaskGraph::Sequence(children) => {
                let mut frontier = preds.to_vec();
                for child in children {
                    frontier = self.lower_into(child, &frontier);
                }
                frontier
            }
            TaskGraph::Parallel(children) => {
                if children.is_empty() {
                    return preds.to_vec();
                }
                let mut sinks = Vec::new();
                for child in children {
                    sinks.extend(self.lower_into(child, preds));
                }
                sinks
            }
        }
    }

    fn validate_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> dependent.
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for id in self.node_ids() {
            graph.add_node(id);
        }
        for id in self.node_ids() {
            for &dep in self.dependencies_of(id) {
                graph.add_edge(dep, id, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let node = cycle.node_id();
                Err(SitepipeError::GraphCycle(format!(
                    "cycle detected in task graph involving task '{}'",
                    self.nodes[node].task.name()
                )))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    pub fn task(&self, id: NodeId) -> Option<&Task> {
        self.nodes.get(id).map(|n| &n.task)
    }

    /// Immediate dependencies of a node.
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a node.
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes without dependencies.
    pub fn roots(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| self.dependencies_of(id).is_empty())
            .collect()
    }
}

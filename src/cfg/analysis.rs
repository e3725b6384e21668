//! FlowGraph: petgraph view of a `Flowchart` for structural checks.
//!
//! Every implicit CFG edge (typed child slots, loop-back markers, jump
//! targets) becomes an explicit, labelled edge. Back-edges are kept apart so
//! "every cycle is a loop back-edge" reduces to "the forward graph is a DAG".

use std::collections::HashSet;

use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::cfg::{Flowchart, JumpKind, NodeId, NodeKind};
use crate::error::{FlowchartError, Result};

/// Why one node follows another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Next,
    True,
    False,
    Body,
    Exit,
    /// Return to a loop header drawn above the source.
    Back,
    /// Resolved break, or continue into a post-test condition.
    Jump,
}

impl EdgeKind {
    pub fn is_back(self) -> bool {
        self == EdgeKind::Back
    }
}

pub struct FlowGraph {
    pub digraph: DiGraph<NodeId, EdgeKind>,
    start: NodeIndex,
    end: NodeIndex,
}

impl FlowGraph {
    /// Mirror `chart` into a petgraph DiGraph. Node indices equal `NodeId`s.
    pub fn from_flowchart(chart: &Flowchart) -> Self {
        let mut digraph: DiGraph<NodeId, EdgeKind> = DiGraph::new();
        for node in chart.nodes() {
            digraph.add_node(node.id);
        }

        let ix = |id: NodeId| NodeIndex::new(id.index());
        for node in chart.nodes() {
            let from = ix(node.id);
            for &n in &node.next {
                digraph.add_edge(from, ix(n), EdgeKind::Next);
            }
            match node.kind {
                NodeKind::Decision {
                    true_branch,
                    false_branch,
                } => {
                    if let Some(t) = true_branch {
                        digraph.add_edge(from, ix(t), EdgeKind::True);
                    }
                    if let Some(f) = false_branch {
                        digraph.add_edge(from, ix(f), EdgeKind::False);
                    }
                }
                NodeKind::PreTestLoop { body, exit } => {
                    if let Some(b) = body {
                        digraph.add_edge(from, ix(b), EdgeKind::Body);
                    }
                    if let Some(e) = exit {
                        digraph.add_edge(from, ix(e), EdgeKind::Exit);
                    }
                }
                NodeKind::PostTestLoop { body, exit } => {
                    // the body sits above the condition
                    if let Some(b) = body {
                        digraph.add_edge(from, ix(b), EdgeKind::Back);
                    }
                    if let Some(e) = exit {
                        digraph.add_edge(from, ix(e), EdgeKind::Exit);
                    }
                }
                NodeKind::LoopBack { header } => {
                    digraph.add_edge(from, ix(header), header_edge(chart, header));
                }
                NodeKind::Connector {
                    jump: JumpKind::Break,
                    target: Some(header),
                } => {
                    if let Some((_, Some(exit))) = chart.kind(header).loop_slots() {
                        digraph.add_edge(from, ix(exit), EdgeKind::Jump);
                    }
                }
                NodeKind::Connector {
                    jump: JumpKind::Continue,
                    target: Some(header),
                } => {
                    let kind = match header_edge(chart, header) {
                        EdgeKind::Back => EdgeKind::Back,
                        _ => EdgeKind::Jump,
                    };
                    digraph.add_edge(from, ix(header), kind);
                }
                _ => {}
            }
        }

        Self {
            digraph,
            start: ix(chart.start()),
            end: ix(chart.end()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.digraph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.digraph.edge_count()
    }

    /// The graph without its back-edges.
    pub fn forward(&self) -> DiGraph<NodeId, EdgeKind> {
        self.digraph
            .filter_map(|_, n| Some(*n), |_, e| (!e.is_back()).then_some(*e))
    }

    /// True if every cycle passes through a loop back-edge.
    pub fn is_dag(&self) -> bool {
        !is_cyclic_directed(&self.forward())
    }

    /// Topological order of the forward graph, or None if it has a cycle.
    #[cfg(test)]
    pub(crate) fn topological_order(&self) -> Option<Vec<NodeId>> {
        let forward = self.forward();
        match petgraph::algo::toposort(&forward, None) {
            Ok(indices) => Some(indices.into_iter().map(|idx| forward[idx]).collect()),
            Err(_) => None,
        }
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.degree(id, Direction::Incoming)
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    fn degree(&self, id: NodeId, dir: Direction) -> usize {
        let idx = NodeIndex::new(id.index());
        if idx.index() >= self.digraph.node_count() {
            return 0;
        }
        self.digraph.edges_directed(idx, dir).count()
    }

    /// Successors with the kind of edge leading to each, sorted by id.
    #[cfg(test)]
    pub(crate) fn successors(&self, id: NodeId) -> Vec<(NodeId, EdgeKind)> {
        use petgraph::visit::EdgeRef;

        let idx = NodeIndex::new(id.index());
        if idx.index() >= self.digraph.node_count() {
            return Vec::new();
        }
        let mut out: Vec<(NodeId, EdgeKind)> = self
            .digraph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (self.digraph[e.target()], *e.weight()))
            .collect();
        out.sort_by_key(|(n, _)| *n);
        out
    }

    /// Nodes reachable from the start terminal.
    pub fn reachable(&self) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut dfs = Dfs::new(&self.digraph, self.start);
        while let Some(idx) = dfs.next(&self.digraph) {
            seen.insert(self.digraph[idx]);
        }
        seen
    }

    /// Nodes from which the end terminal can be reached.
    pub fn reaching_end(&self) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let reversed = Reversed(&self.digraph);
        let mut dfs = Dfs::new(reversed, self.end);
        while let Some(idx) = dfs.next(reversed) {
            seen.insert(self.digraph[idx]);
        }
        seen
    }

    /// Check the structural invariants of a finished flowchart.
    pub fn validate(&self, chart: &Flowchart) -> Result<()> {
        let starts = terminal_count(chart, true);
        let ends = terminal_count(chart, false);
        if starts != 1 || ends != 1 {
            return Err(FlowchartError::InvalidGraph(format!(
                "expected one start and one end terminal, found {starts} and {ends}"
            )));
        }

        for node in chart.nodes() {
            if let Some((t, f)) = node.kind.branches() {
                if node.next.iter().any(|n| Some(*n) == t || Some(*n) == f) {
                    return Err(FlowchartError::InvalidGraph(format!(
                        "decision #{} lists a branch root as its continuation",
                        node.id.index()
                    )));
                }
            }
        }

        if !self.is_dag() {
            return Err(FlowchartError::InvalidGraph(
                "cycle that is not a loop back-edge".to_string(),
            ));
        }

        let reaching = self.reaching_end();
        let mut stuck: Vec<NodeId> = self
            .reachable()
            .into_iter()
            .filter(|id| !reaching.contains(id))
            .collect();
        if !stuck.is_empty() {
            stuck.sort();
            return Err(FlowchartError::InvalidGraph(format!(
                "node #{} never reaches the end terminal",
                stuck[0].index()
            )));
        }

        Ok(())
    }
}

/// Edge kind of an arrival at a loop header: back for a pre-test loop, whose
/// condition sits above its body; forward for a post-test loop.
fn header_edge(chart: &Flowchart, header: NodeId) -> EdgeKind {
    match chart.kind(header) {
        NodeKind::PostTestLoop { .. } => EdgeKind::Next,
        _ => EdgeKind::Back,
    }
}

fn terminal_count(chart: &Flowchart, start: bool) -> usize {
    chart
        .nodes()
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Terminal { is_start } if is_start == start))
        .count()
}

#[cfg(test)]
#[path = "../../tests/rust/test_cfg_analysis.rs"]
mod tests;

//! Control flow graph of one function.
//!
//! Nodes live in an arena (`Flowchart`) and refer to each other by `NodeId`,
//! so loop back-edges need no shared ownership. Topology is fixed once the
//! builder returns; layout only writes `FlowNode::bounds`.

pub mod analysis;
pub mod builder;
pub mod debug;

pub use analysis::{EdgeKind, FlowGraph};
pub use builder::FlowchartBuilder;

use crate::ast::Location;

/// Index of a node inside its `Flowchart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

impl JumpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JumpKind::Break => "break",
            JumpKind::Continue => "continue",
        }
    }
}

/// Variant tag plus the typed child slots of each variant.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Terminal {
        is_start: bool,
    },
    Process {
        is_return: bool,
    },
    Decision {
        true_branch: Option<NodeId>,
        false_branch: Option<NodeId>,
    },
    /// while / for: condition drawn above the body.
    PreTestLoop {
        body: Option<NodeId>,
        exit: Option<NodeId>,
    },
    /// do-while: condition drawn below the body.
    PostTestLoop {
        body: Option<NodeId>,
        exit: Option<NodeId>,
    },
    /// End of a loop body; stands for the edge back to `header`.
    LoopBack {
        header: NodeId,
    },
    /// break / continue sentinel. `target` is the innermost enclosing loop.
    Connector {
        jump: JumpKind,
        target: Option<NodeId>,
    },
}

impl NodeKind {
    /// Upper-case tag used by the graph dump.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Terminal { .. } => "TERMINAL",
            NodeKind::Process { .. } => "PROCESS",
            NodeKind::Decision { .. } => "DECISION",
            NodeKind::PreTestLoop { .. } => "LOOP",
            NodeKind::PostTestLoop { .. } => "DO_WHILE",
            NodeKind::LoopBack { .. } => "LOOP_BACK",
            NodeKind::Connector { .. } => "CONNECTOR",
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            NodeKind::PreTestLoop { .. } | NodeKind::PostTestLoop { .. }
        )
    }

    /// Drawn as a diamond.
    pub fn is_diamond(&self) -> bool {
        matches!(self, NodeKind::Decision { .. }) || self.is_loop()
    }

    pub fn loop_slots(&self) -> Option<(Option<NodeId>, Option<NodeId>)> {
        match *self {
            NodeKind::PreTestLoop { body, exit } | NodeKind::PostTestLoop { body, exit } => {
                Some((body, exit))
            }
            _ => None,
        }
    }

    pub fn branches(&self) -> Option<(Option<NodeId>, Option<NodeId>)> {
        match *self {
            NodeKind::Decision {
                true_branch,
                false_branch,
            } => Some((true_branch, false_branch)),
            _ => None,
        }
    }
}

/// Layout-assigned box: `x` is the horizontal centre, `y` the top edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub location: Location,
    /// Forward successors in the linearised flow.
    pub next: Vec<NodeId>,
    pub bounds: Bounds,
}

/// Arena of CFG nodes with a single start and a single end terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct Flowchart {
    nodes: Vec<FlowNode>,
    start: NodeId,
    end: NodeId,
}

impl Flowchart {
    /// Fresh graph holding only the two terminals.
    pub fn new(function_name: &str, location: Location) -> Self {
        let mut chart = Self {
            nodes: Vec::new(),
            start: NodeId(0),
            end: NodeId(0),
        };
        chart.start = chart.add(NodeKind::Terminal { is_start: true }, function_name, location);
        chart.end = chart.add(
            NodeKind::Terminal { is_start: false },
            "end",
            Location::default(),
        );
        chart
    }

    pub fn add(&mut self, kind: NodeKind, label: impl Into<String>, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FlowNode {
            id,
            kind,
            label: label.into(),
            location,
            next: Vec::new(),
            bounds: Bounds::default(),
        });
        id
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &FlowNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FlowNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn label(&self, id: NodeId) -> &str {
        &self.nodes[id.0].label
    }

    pub fn next(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].next
    }

    pub fn is_end(&self, id: NodeId) -> bool {
        id == self.end
    }

    pub fn is_return(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Process { is_return: true })
    }

    pub fn is_process(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Process { .. })
    }

    pub fn is_loop_back(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::LoopBack { .. })
    }

    pub fn jump_kind(&self, id: NodeId) -> Option<JumpKind> {
        match *self.kind(id) {
            NodeKind::Connector { jump, .. } => Some(jump),
            _ => None,
        }
    }

    /// Number of nodes drawn as diamonds.
    pub fn diamond_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.kind.is_diamond()).count()
    }

    /// Post-merge successors of a decision with its branch roots filtered out.
    pub fn decision_next(&self, id: NodeId) -> Vec<NodeId> {
        let (t, f) = self.kind(id).branches().unwrap_or((None, None));
        self.next(id)
            .iter()
            .copied()
            .filter(|n| Some(*n) != t && Some(*n) != f)
            .collect()
    }
}

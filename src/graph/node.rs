use std::sync::atomic::{AtomicUsize, Ordering};

use super::op::Op;

/// ATOMIC auto incrementing id for all nodes.
// Shared by all graphs: an id from one graph never names a node of another.
static NODE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn new() -> Self {
        // Relaxed: only uniqueness matters.
        Self(NODE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// Represents a scalar in the computational graph.
// A node is either a leaf (an input created by the caller) or the output of an operation.
// Only `grad` changes after construction.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub data: f64,
    pub grad: f64,
    pub op: Op,
    pub inputs: Vec<NodeId>,
    pub label: Option<String>,
}

impl Node {
    // Create a new leaf node
    pub fn new_leaf(data: f64) -> Self {
        Self::new(data, Op::Leaf, Vec::new())
    }

    // Create a new node from an operation
    pub fn from_op(op: Op, inputs: Vec<NodeId>, data: f64) -> Self {
        Self::new(data, op, inputs)
    }

    fn new(data: f64, op: Op, inputs: Vec<NodeId>) -> Self {
        Self {
            id: NodeId::new(),
            data,
            grad: 0.0,
            op,
            inputs,
            label: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Tag of the operation that produced this node, empty for leaves.
    pub fn operation_tag(&self) -> String {
        self.op.tag()
    }
}

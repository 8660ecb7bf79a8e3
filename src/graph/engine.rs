use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use super::node::{Node, NodeId};
use super::op::Op;
use crate::error::{GraphError, Result};

/// Operand of an arithmetic operation: an existing node or a plain number.
///
/// Plain numbers are promoted to fresh leaf nodes when the operation is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Node(NodeId),
    Scalar(f64),
}

impl From<NodeId> for Operand {
    fn from(id: NodeId) -> Self {
        Operand::Node(id)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

/// Computational graph over scalars.
///
/// The graph owns every node it creates (it is the arena); nodes refer to their
/// predecessors by [`NodeId`] only, so a node can be shared by any number of
/// successors. Nodes are never removed.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        trace!("created {} '{}' = {}", id, node.op.tag(), node.data);
        self.nodes.insert(id, node);
        id
    }

    /// Creates a leaf node holding `data`.
    pub fn value(&mut self, data: f64) -> NodeId {
        self.add_node(Node::new_leaf(data))
    }

    /// Creates a named leaf node. The label is only used when inspecting the graph.
    pub fn labeled(&mut self, data: f64, label: impl Into<String>) -> NodeId {
        let mut node = Node::new_leaf(data);
        node.label = Some(label.into());
        self.add_node(node)
    }

    /// Creates a node from explicit parts.
    ///
    /// The node records `inputs` and `tag` for inspection but its backward rule is a
    /// no-op: gradients stop here. With no inputs and an empty tag this is a leaf.
    pub fn node(&mut self, data: f64, inputs: Vec<NodeId>, tag: impl Into<String>) -> Result<NodeId> {
        for &input in &inputs {
            self.check_operand(input)?;
        }
        let tag = tag.into();
        let op = if inputs.is_empty() && tag.is_empty() {
            Op::Leaf
        } else {
            Op::Custom(tag)
        };
        Ok(self.add_node(Node::from_op(op, inputs, data)))
    }

    pub fn set_label(&mut self, node_id: NodeId, label: impl Into<String>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.label = Some(label.into());
        Ok(())
    }

    fn check_operand(&self, node_id: NodeId) -> Result<()> {
        if self.nodes.contains_key(&node_id) {
            Ok(())
        } else {
            Err(GraphError::TypeMismatch(node_id))
        }
    }

    // Checks every node operand before any number is promoted, so a failed
    // operation leaves the graph unchanged.
    fn check_operands(&self, operands: &[Operand]) -> Result<()> {
        for operand in operands {
            if let Operand::Node(id) = *operand {
                self.check_operand(id)?;
            }
        }
        Ok(())
    }

    // Turns an operand into a node of this graph, promoting numbers to leaves.
    fn resolve(&mut self, operand: Operand) -> Result<NodeId> {
        match operand {
            Operand::Node(id) => {
                self.check_operand(id)?;
                Ok(id)
            }
            Operand::Scalar(value) => Ok(self.value(value)),
        }
    }

    fn apply_operation(&mut self, op: Op, inputs: Vec<NodeId>) -> Result<NodeId> {
        debug_assert_eq!(op.num_inputs(), Some(inputs.len()));

        let input_data = inputs
            .iter()
            .map(|&id| self.data(id))
            .collect::<Result<Vec<_>>>()?;

        // Operators used here always derive their value from the inputs.
        let data = op.compute(&input_data).unwrap_or(f64::NAN);
        Ok(self.add_node(Node::from_op(op, inputs, data)))
    }

    // GRAPH OPERATIONS:
    //
    // Each operation returns a brand-new node whose predecessors are the operands,
    // so the graph stays acyclic by construction.

    // Addition: a + b
    pub fn add(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NodeId> {
        let (a, b) = (a.into(), b.into());
        self.check_operands(&[a, b])?;
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        self.apply_operation(Op::Add, vec![a, b])
    }

    // Multiplication: a * b
    pub fn mul(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NodeId> {
        let (a, b) = (a.into(), b.into());
        self.check_operands(&[a, b])?;
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        self.apply_operation(Op::Mul, vec![a, b])
    }

    /// Power with a constant exponent: a ** exponent.
    ///
    /// Fails with [`GraphError::InvalidOperand`] if the exponent is NaN or infinite.
    pub fn pow(&mut self, a: impl Into<Operand>, exponent: f64) -> Result<NodeId> {
        if !exponent.is_finite() {
            return Err(GraphError::InvalidOperand { exponent });
        }
        let a = self.resolve(a.into())?;
        self.apply_operation(Op::Pow { exponent }, vec![a])
    }

    // Negation: a * -1
    pub fn neg(&mut self, a: impl Into<Operand>) -> Result<NodeId> {
        self.mul(a, -1.0)
    }

    // Subtraction: a + (-b)
    pub fn sub(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NodeId> {
        let (a, b) = (a.into(), b.into());
        self.check_operands(&[a, b])?;
        let a = self.resolve(a)?;
        let minus_b = self.neg(b)?;
        self.add(a, minus_b)
    }

    // Division: a * b ** -1
    pub fn div(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NodeId> {
        let (a, b) = (a.into(), b.into());
        self.check_operands(&[a, b])?;
        let a = self.resolve(a)?;
        let inv_b = self.pow(b, -1.0)?;
        self.mul(a, inv_b)
    }

    // Rectified linear unit: max(0, a)
    pub fn relu(&mut self, a: impl Into<Operand>) -> Result<NodeId> {
        let a = self.resolve(a.into())?;
        self.apply_operation(Op::ReLU, vec![a])
    }

    /// Runs reverse-mode differentiation from `root`.
    ///
    /// After this call every node reachable from `root` holds d(root)/d(node) in its
    /// gradient, and `root` itself holds 1.0. Gradients of non-root nodes are
    /// accumulated, not overwritten: calling `backward` twice without
    /// [`Graph::zero_grad`] in between adds the second pass on top of the first.
    /// Nodes not reachable from `root` are left untouched.
    pub fn backward(&mut self, root: NodeId) -> Result<()> {
        let topo_order = self.topological_sort(root)?;
        debug!("backward from {} over {} nodes", root, topo_order.len());

        if let Some(node) = self.nodes.get_mut(&root) {
            node.grad = 1.0;
        }

        // Reverse topological order: a node's gradient is complete before its
        // own rule distributes it to the inputs.
        for &node_id in topo_order.iter().rev() {
            self.local_backward(node_id)?;
        }

        Ok(())
    }

    /// Applies the backward rule of a single node.
    ///
    /// Adds the node's chain-rule contribution into the gradient of each of its
    /// inputs using the node's current gradient. Leaves contribute nothing.
    pub fn local_backward(&mut self, node_id: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;

        if matches!(node.op, Op::Leaf | Op::Custom(_)) {
            return Ok(());
        }

        let input_data = node
            .inputs
            .iter()
            .map(|&id| self.data(id))
            .collect::<Result<Vec<_>>>()?;
        let input_grads = node.op.gradient(node.grad, &input_data, node.data);
        let inputs = node.inputs.clone();

        // Accumulate, a node used several times receives the sum of all contributions.
        for (input_id, input_grad) in inputs.into_iter().zip(input_grads) {
            if let Some(input) = self.nodes.get_mut(&input_id) {
                input.grad += input_grad;
            }
        }

        Ok(())
    }

    /// TOPOLOGICAL SORTING
    ///
    /// Returns every node reachable from `root`, each one after all of its inputs
    /// (depth-first post-order). Shared nodes appear once.
    pub fn topological_sort(&self, root: NodeId) -> Result<Vec<NodeId>> {
        if !self.nodes.contains_key(&root) {
            return Err(GraphError::NodeNotFound(root));
        }

        let mut visited = HashSet::new();
        let mut topo_order = Vec::new();
        // Explicit stack instead of recursion so long chains cannot overflow.
        // The flag marks a node whose inputs have already been pushed.
        let mut stack = vec![(root, false)];

        while let Some((node_id, expanded)) = stack.pop() {
            if expanded {
                topo_order.push(node_id);
                continue;
            }
            if !visited.insert(node_id) {
                continue;
            }

            stack.push((node_id, true));
            let node = self
                .nodes
                .get(&node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            // Pushed in reverse so inputs are visited in their recorded order.
            for &input_id in node.inputs.iter().rev() {
                if !visited.contains(&input_id) {
                    stack.push((input_id, false));
                }
            }
        }

        Ok(topo_order)
    }

    /// Recomputes the value of `root` with some leaf values replaced.
    ///
    /// The graph itself is not modified. Nodes without a derivable value (leaves
    /// and custom nodes) take their value from `overrides` if present, otherwise
    /// their recorded value.
    pub fn forward_with(&self, root: NodeId, overrides: &HashMap<NodeId, f64>) -> Result<f64> {
        let topo_order = self.topological_sort(root)?;
        let mut values: HashMap<NodeId, f64> = HashMap::with_capacity(topo_order.len());

        for node_id in topo_order {
            let node = self
                .nodes
                .get(&node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            let value = match overrides.get(&node_id) {
                Some(&value) if node.is_leaf() => value,
                _ => {
                    let input_values = node
                        .inputs
                        .iter()
                        .map(|id| values.get(id).copied().ok_or(GraphError::NodeNotFound(*id)))
                        .collect::<Result<Vec<_>>>()?;
                    node.op.compute(&input_values).unwrap_or(node.data)
                }
            };
            values.insert(node_id, value);
        }

        values.get(&root).copied().ok_or(GraphError::NodeNotFound(root))
    }

    /// Resets the gradient of every node in the graph to zero.
    pub fn zero_grad(&mut self) {
        debug!("zeroing gradients of {} nodes", self.nodes.len());
        for node in self.nodes.values_mut() {
            node.grad = 0.0;
        }
    }

    /// Resets the gradient of every node reachable from `root` to zero.
    pub fn zero_grad_from(&mut self, root: NodeId) -> Result<()> {
        let topo_order = self.topological_sort(root)?;
        debug!("zeroing gradients of {} nodes below {}", topo_order.len(), root);
        for node_id in topo_order {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.grad = 0.0;
            }
        }
        Ok(())
    }

    fn node_ref(&self, node_id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    // Forward value of a node
    pub fn data(&self, node_id: NodeId) -> Result<f64> {
        Ok(self.node_ref(node_id)?.data)
    }

    // Accumulated gradient of a node
    pub fn grad(&self, node_id: NodeId) -> Result<f64> {
        Ok(self.node_ref(node_id)?.grad)
    }

    pub fn operation_tag(&self, node_id: NodeId) -> Result<String> {
        Ok(self.node_ref(node_id)?.operation_tag())
    }

    pub fn predecessors(&self, node_id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node_ref(node_id)?.inputs)
    }

    pub fn label(&self, node_id: NodeId) -> Result<Option<&str>> {
        Ok(self.node_ref(node_id)?.label.as_deref())
    }

    /// GRAPH STATISTICS
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

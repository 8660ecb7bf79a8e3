//! Error types for graph construction, differentiation and rendering.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised by the scalar graph.
///
/// All of them are reported at call time; nothing is deferred to the backward pass.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The exponent given to a power operation is not a finite real number.
    #[error("Invalid operand: power exponent must be a finite real number, got {exponent}")]
    InvalidOperand { exponent: f64 },

    /// An operand refers to a node that was not built by this graph.
    #[error("Type mismatch: operand {0} is not a node of this graph")]
    TypeMismatch(NodeId),

    /// A query or backward root refers to an unknown node.
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Graphviz could not render the graph.
    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

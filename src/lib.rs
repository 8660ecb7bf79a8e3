//! # Micrograd
//!
//! Micrograd is a tiny reverse-mode automatic differentiation engine over scalar
//! values, meant to show how backpropagation works on an explicit computation graph.
//!
//! ## Features
//!
//! - Reverse-mode automatic differentiation (backpropagation)
//! - Dynamic computation graph construction
//! - Add, multiply, power, subtract, divide, negate and ReLU
//! - Gradient accumulation across shared sub-expressions
//! - Finite difference gradient checking
//! - Graph visualization (image output requires GraphViz installed)
//! - Written 100% in safe Rust
//!
//! ```
//! use micrograd::Graph;
//!
//! let mut graph = Graph::new();
//! let a = graph.value(-4.0);
//! let b = graph.value(2.0);
//! let c = graph.value(10.0);
//!
//! let ab = graph.mul(a, b)?;
//! let f = graph.add(ab, c)?;
//! graph.backward(f)?;
//!
//! assert_eq!(graph.data(f)?, 2.0);
//! assert_eq!(graph.grad(a)?, 2.0);
//! assert_eq!(graph.grad(b)?, -4.0);
//! assert_eq!(graph.grad(c)?, 1.0);
//! # Ok::<(), micrograd::GraphError>(())
//! ```
pub mod error;
pub mod finite_diff;
pub mod graph;

// Re-export commonly used types for convenience
pub use error::{GraphError, Result};
pub use finite_diff::{finite_diff_grad, max_grad_error, numerical_gradients, try_finite_diff_grad};
pub use graph::{EngineVisualization, Graph, GraphVisualizer, NodeId, Operand, VisualizationConfig};

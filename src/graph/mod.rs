pub mod engine;
pub mod node;
pub mod op;
pub mod plot;

pub use engine::{Graph, Operand};
pub use node::{Node, NodeId};
pub use op::Op;
pub use plot::{EngineVisualization, GraphVisualizer, Trace, VisualizationConfig};

use std::collections::HashSet;
use std::fmt::Write;
use std::fs::File;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::warn;

use super::engine::Graph;
use super::node::{Node, NodeId};
use crate::error::{GraphError, Result};

/// Graph visualization for the scalar graph. Read-only: nothing here mutates a node.
pub struct GraphVisualizer {
    /// Optional styling configuration
    pub config: VisualizationConfig,
}

/// Configuration for graph visualization
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    /// Graphviz layout direction ("LR", "TB", ...)
    pub rankdir: String,
    /// Decimals shown for data and gradient
    pub precision: usize,
    pub show_labels: bool,
    pub node_color: String,
    pub leaf_color: String,
    pub op_color: String,
    /// Graphviz program used to render images
    pub graphviz_command: String,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            rankdir: "LR".to_string(),
            precision: 4,
            show_labels: true,
            node_color: "#E3F2FD".to_string(),
            leaf_color: "#E8F5E8".to_string(),
            op_color: "#FFF3E0".to_string(),
            graphviz_command: "dot".to_string(),
        }
    }
}

/// Nodes and edges reachable from a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Unique nodes in depth-first discovery order
    pub nodes: Vec<NodeId>,
    /// (predecessor, successor) pairs, one per recorded input
    pub edges: Vec<(NodeId, NodeId)>,
}

impl Default for GraphVisualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphVisualizer {
    pub fn new() -> Self {
        Self {
            config: VisualizationConfig::default(),
        }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    /// Collects every node and edge reachable from `root`.
    ///
    /// Nodes are deduplicated by id, so shared sub-expressions (and, defensively,
    /// cycles) are visited once.
    pub fn trace(&self, graph: &Graph, root: NodeId) -> Result<Trace> {
        let mut visited = HashSet::new();
        let mut trace = Trace {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        let mut stack = vec![root];

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            trace.nodes.push(node_id);

            let inputs = graph.predecessors(node_id)?;
            for &input_id in inputs {
                trace.edges.push((input_id, node_id));
            }
            stack.extend(inputs.iter().rev().filter(|id| !visited.contains(*id)));
        }

        Ok(trace)
    }

    /// Generate DOT format representation of the graph below `root`
    ///
    /// Every node is drawn as a record with its data and gradient. Nodes produced
    /// by an operation get an extra circle holding the operation tag, sitting between
    /// the inputs and the node.
    pub fn to_dot(&self, graph: &Graph, root: NodeId) -> Result<String> {
        let trace = self.trace(graph, root)?;

        let mut dot = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(dot, "digraph ComputationalGraph {{");
        let _ = writeln!(dot, "    rankdir={};", self.config.rankdir);
        let _ = writeln!(dot, "    node [style=filled];");

        for &node_id in &trace.nodes {
            let node = graph
                .get_node(node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\", shape=record, fillcolor=\"{}\"];",
                node_id.0,
                self.create_node_label(node),
                self.get_node_color(node)
            );

            let tag = node.operation_tag();
            if !tag.is_empty() {
                let _ = writeln!(
                    dot,
                    "    \"{}_op\" [label=\"{}\", shape=circle, fillcolor=\"{}\"];",
                    node_id.0,
                    escape(&tag),
                    self.config.op_color
                );
                let _ = writeln!(dot, "    \"{}_op\" -> \"{}\";", node_id.0, node_id.0);
            }
        }

        for &(from, to) in &trace.edges {
            let has_op = graph
                .get_node(to)
                .is_some_and(|node| !node.operation_tag().is_empty());
            if has_op {
                let _ = writeln!(dot, "    \"{}\" -> \"{}_op\";", from.0, to.0);
            } else {
                let _ = writeln!(dot, "    \"{}\" -> \"{}\";", from.0, to.0);
            }
        }

        let _ = writeln!(dot, "}}");
        Ok(dot)
    }

    /// Create a record label for a node: `{ label | data .. | grad .. }`
    fn create_node_label(&self, node: &Node) -> String {
        let precision = self.config.precision;
        let mut label = String::from("{ ");

        if self.config.show_labels {
            if let Some(name) = &node.label {
                let _ = write!(label, "{} | ", escape(name));
            }
        }

        let _ = write!(
            label,
            "data {:.*} | grad {:.*} }}",
            precision, node.data, precision, node.grad
        );
        label
    }

    fn get_node_color(&self, node: &Node) -> &str {
        if node.is_leaf() {
            &self.config.leaf_color
        } else {
            &self.config.node_color
        }
    }

    /// Save the graph as a DOT file
    pub fn save_dot(&self, graph: &Graph, root: NodeId, path: impl AsRef<Path>) -> Result<()> {
        let dot_content = self.to_dot(graph, root)?;
        let mut file = File::create(path)?;
        file.write_all(dot_content.as_bytes())?;
        Ok(())
    }

    /// Generate and save the graph as an image (requires Graphviz)
    pub fn save_image(
        &self,
        graph: &Graph,
        root: NodeId,
        path: impl AsRef<Path>,
        format: &str,
    ) -> Result<()> {
        let path = path.as_ref();
        // "<path>.dot" never collides with the output or with a DOT file saved next to it.
        let mut temp_dot = path.as_os_str().to_owned();
        temp_dot.push(".dot");
        let temp_dot = PathBuf::from(temp_dot);
        self.save_dot(graph, root, &temp_dot)?;

        let output = Command::new(&self.config.graphviz_command)
            .arg(format!("-T{}", format))
            .arg(&temp_dot)
            .arg("-o")
            .arg(path)
            .output();

        // Clean up temporary file before reporting any failure
        let removed = std::fs::remove_file(&temp_dot);
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!("graphviz failed to render {}: {}", path.display(), stderr);
            return Err(GraphError::Render(stderr));
        }
        removed?;

        Ok(())
    }

    /// Text representation of the graph, one node per line in topological order
    pub fn format_graph(&self, graph: &Graph, root: NodeId) -> Result<String> {
        let precision = self.config.precision;
        let mut out = String::new();
        let _ = writeln!(out, "Computational Graph:");
        let _ = writeln!(out, "===================");

        for node_id in graph.topological_sort(root)? {
            let node = graph
                .get_node(node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;

            let _ = write!(out, "Node {}: ", node_id.0);
            if let Some(name) = node.label.as_deref().filter(|_| self.config.show_labels) {
                let _ = write!(out, "{} ", name);
            }
            let tag = node.operation_tag();
            if tag.is_empty() {
                let _ = write!(out, "leaf ");
            } else {
                let _ = write!(out, "{} ", tag);
            }
            let _ = write!(
                out,
                "data={:.*} grad={:.*}",
                precision, node.data, precision, node.grad
            );
            if !node.inputs.is_empty() {
                let inputs: Vec<usize> = node.inputs.iter().map(|id| id.0).collect();
                let _ = write!(out, " <- {:?}", inputs);
            }
            let _ = writeln!(out);
        }

        Ok(out)
    }

    /// Print the graph to console
    pub fn print_graph(&self, graph: &Graph, root: NodeId) -> Result<()> {
        print!("{}", self.format_graph(graph, root)?);
        Ok(())
    }
}

// Quotes, braces and pipes have a meaning inside record labels.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '{' | '}' | '|' | '<' | '>' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Extension trait to add visualization methods directly to Graph
pub trait EngineVisualization {
    fn visualize(&self) -> GraphVisualizer;
    fn plot_graph(&self, root: NodeId) -> Result<()>;
    fn save_graph_image(&self, root: NodeId, path: impl AsRef<Path>) -> Result<()>;
    fn save_graph_dot(&self, root: NodeId, path: impl AsRef<Path>) -> Result<()>;
}

impl EngineVisualization for Graph {
    fn visualize(&self) -> GraphVisualizer {
        GraphVisualizer::new()
    }

    fn plot_graph(&self, root: NodeId) -> Result<()> {
        self.visualize().print_graph(self, root)
    }

    fn save_graph_image(&self, root: NodeId, path: impl AsRef<Path>) -> Result<()> {
        self.visualize().save_image(self, root, path, "png")
    }

    fn save_graph_dot(&self, root: NodeId, path: impl AsRef<Path>) -> Result<()> {
        self.visualize().save_dot(self, root, path)
    }
}

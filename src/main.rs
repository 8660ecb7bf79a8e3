//! CLI demo for the scalar autodiff engine.
//!
//! Builds `i = (a*b + c) * f - h`, runs the backward pass, prints every gradient,
//! checks them against finite differences and optionally renders the graph.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use micrograd::{
    Graph, GraphVisualizer, NodeId, Result, VisualizationConfig, max_grad_error,
    numerical_gradients,
};

#[derive(Parser)]
#[command(name = "micrograd")]
#[command(about = "Reverse-mode autodiff over scalars - builds a small graph and backpropagates")]
#[command(version)]
struct Cli {
    /// Write the graph in Graphviz DOT format to this file
    #[arg(long, value_name = "PATH")]
    dot: Option<PathBuf>,

    /// Render the graph to this image file (requires the `dot` binary)
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Image format passed to Graphviz
    #[arg(long, default_value = "png")]
    format: String,

    /// Graph layout direction
    #[arg(long, default_value = "LR")]
    rankdir: String,

    /// Decimals shown for data and gradients
    #[arg(long, default_value_t = 4)]
    precision: usize,

    /// Zero the gradients and run the backward pass a second time
    #[arg(long)]
    reset: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    println!("=== Scalar Autodiff Demo ===\n");

    let mut graph = Graph::new();
    let a = graph.labeled(-4.0, "a");
    let b = graph.labeled(2.0, "b");
    let c = graph.labeled(10.0, "c");
    let e = graph.mul(a, b)?;
    graph.set_label(e, "e")?;
    let d = graph.add(e, c)?;
    graph.set_label(d, "d")?;
    let f = graph.labeled(-2.0, "f");
    let g = graph.mul(d, f)?;
    graph.set_label(g, "g")?;
    let h = graph.labeled(5.0, "h");
    let i = graph.sub(g, h)?;
    graph.set_label(i, "i")?;

    println!("Expression: i = (a*b + c) * f - h");
    println!("Value:      i = {}\n", graph.data(i)?);

    graph.backward(i)?;
    if cli.reset {
        // A second pass without zeroing would double every non-root gradient.
        graph.zero_grad();
        graph.backward(i)?;
    }

    let named = [("a", a), ("b", b), ("c", c), ("e", e), ("d", d), ("f", f), ("g", g), ("h", h)];
    println!("Autodiff gradients:");
    for (name, id) in named {
        println!("  di/d{} = {}", name, graph.grad(id)?);
    }

    let leaves: Vec<NodeId> = vec![a, b, c, f, h];
    let analytic = leaves
        .iter()
        .map(|&leaf| graph.grad(leaf))
        .collect::<Result<Vec<_>>>()?;
    let numeric = numerical_gradients(&graph, i, &leaves, 1e-7)?;
    let max_err = max_grad_error(&analytic, &numeric);
    println!("\nMax error against finite differences: {:.2e}", max_err);

    let visualizer = GraphVisualizer::with_config(VisualizationConfig {
        rankdir: cli.rankdir.clone(),
        precision: cli.precision,
        ..VisualizationConfig::default()
    });
    println!();
    visualizer.print_graph(&graph, i)?;

    if let Some(path) = &cli.dot {
        visualizer.save_dot(&graph, i, path)?;
        info!("wrote DOT graph to {}", path.display());
        println!("\nDOT written to {}", path.display());
    }
    if let Some(path) = &cli.image {
        visualizer.save_image(&graph, i, path, &cli.format)?;
        info!("rendered graph to {}", path.display());
        println!("Image written to {}", path.display());
    }

    Ok(())
}

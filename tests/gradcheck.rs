// Gradient checks against central finite differences on randomly built graphs.

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use micrograd::{Graph, NodeId, max_grad_error, numerical_gradients};

const EPS: f64 = 1e-6;

/// Builds a random expression DAG over `num_leaves` leaves.
///
/// Operands are drawn from every node built so far, so leaves and intermediate
/// results are shared by several successors. Divisions only use a leaf as the
/// denominator and leaves stay away from zero, keeping the function smooth.
fn random_graph(rng: &mut StdRng, num_leaves: usize, num_ops: usize) -> (Graph, Vec<NodeId>, NodeId) {
    let mut graph = Graph::new();
    let leaf_values = Uniform::new(0.5, 1.5).unwrap();

    let leaves: Vec<NodeId> = (0..num_leaves)
        .map(|_| graph.value(leaf_values.sample(rng)))
        .collect();
    let mut pool = leaves.clone();

    for _ in 0..num_ops {
        let a = pool[rng.random_range(0..pool.len())];
        let b = pool[rng.random_range(0..pool.len())];
        let node = match rng.random_range(0..7) {
            0 => graph.add(a, b),
            1 => graph.mul(a, b),
            2 => graph.sub(a, b),
            3 => graph.pow(a, 2.0),
            4 => graph.neg(a),
            5 => {
                let denominator = leaves[rng.random_range(0..leaves.len())];
                graph.div(a, denominator)
            }
            _ => graph.add(a, rng.random_range(-2.0..2.0)),
        }
        .unwrap();
        pool.push(node);
    }

    let root = *pool.last().unwrap();
    (graph, leaves, root)
}

#[test]
fn test_random_graphs_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut checked = 0;

    for _ in 0..200 {
        let (mut graph, leaves, root) = random_graph(&mut rng, 3, 6);
        let value = graph.data(root).unwrap();
        if !value.is_finite() || value.abs() > 1e4 {
            continue;
        }

        graph.backward(root).unwrap();
        let analytic: Vec<f64> = leaves.iter().map(|&leaf| graph.grad(leaf).unwrap()).collect();
        let numeric = numerical_gradients(&graph, root, &leaves, EPS).unwrap();

        let scale = 1.0 + value.abs() + analytic.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
        let error = max_grad_error(&analytic, &numeric);
        assert!(
            error <= 1e-4 * scale,
            "analytic {:?} vs numeric {:?} (root value {})",
            analytic,
            numeric,
            value
        );
        assert_eq!(graph.grad(root).unwrap(), 1.0);
        checked += 1;
    }

    assert!(checked > 50, "only {} graphs were checked", checked);
}

#[test]
fn test_random_graph_topological_order() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let (graph, _, root) = random_graph(&mut rng, 4, 12);
        let order = graph.topological_sort(root).unwrap();

        for (position, &node_id) in order.iter().enumerate() {
            for input in graph.predecessors(node_id).unwrap() {
                let input_position = order.iter().position(|id| id == input).unwrap();
                assert!(input_position < position);
            }
        }
        // No duplicates
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), order.len());
    }
}

#[test]
fn test_demo_expression() {
    // i = (a*b + c) * f - h
    let mut graph = Graph::new();
    let a = graph.labeled(-4.0, "a");
    let b = graph.labeled(2.0, "b");
    let c = graph.labeled(10.0, "c");
    let e = graph.mul(a, b).unwrap();
    let d = graph.add(e, c).unwrap();
    let f = graph.labeled(-2.0, "f");
    let g = graph.mul(d, f).unwrap();
    let h = graph.labeled(5.0, "h");
    let i = graph.sub(g, h).unwrap();

    graph.backward(i).unwrap();

    assert_abs_diff_eq!(graph.data(i).unwrap(), -9.0);
    assert_abs_diff_eq!(graph.grad(g).unwrap(), 1.0);
    assert_abs_diff_eq!(graph.grad(h).unwrap(), -1.0);
    assert_abs_diff_eq!(graph.grad(f).unwrap(), 2.0);
    assert_abs_diff_eq!(graph.grad(d).unwrap(), -2.0);
    assert_abs_diff_eq!(graph.grad(e).unwrap(), -2.0);
    assert_abs_diff_eq!(graph.grad(c).unwrap(), -2.0);
    assert_abs_diff_eq!(graph.grad(a).unwrap(), -4.0);
    assert_abs_diff_eq!(graph.grad(b).unwrap(), 8.0);
}

#[test]
fn test_micrograd_readme_expression() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut graph = Graph::new();
    let a = graph.value(-4.0);
    let b = graph.value(2.0);

    // c = a + b
    let mut c = graph.add(a, b).unwrap();
    // d = a * b + b**3
    let ab = graph.mul(a, b).unwrap();
    let b3 = graph.pow(b, 3.0).unwrap();
    let mut d = graph.add(ab, b3).unwrap();

    // c += c + 1
    let t = graph.add(c, 1.0).unwrap();
    c = graph.add(c, t).unwrap();
    // c += 1 + c + (-a)
    let t = graph.add(1.0, c).unwrap();
    let minus_a = graph.neg(a).unwrap();
    let t = graph.add(t, minus_a).unwrap();
    c = graph.add(c, t).unwrap();
    // d += d * 2 + (b + a).relu()
    let t = graph.mul(d, 2.0).unwrap();
    let ba = graph.add(b, a).unwrap();
    let r = graph.relu(ba).unwrap();
    let t = graph.add(t, r).unwrap();
    d = graph.add(d, t).unwrap();
    // d += 3 * d + (b - a).relu()
    let t = graph.mul(3.0, d).unwrap();
    let bma = graph.sub(b, a).unwrap();
    let r = graph.relu(bma).unwrap();
    let t = graph.add(t, r).unwrap();
    d = graph.add(d, t).unwrap();
    // e = c - d, f = e**2, g = f / 2 + 10 / f
    let e = graph.sub(c, d).unwrap();
    let f = graph.pow(e, 2.0).unwrap();
    let half = graph.div(f, 2.0).unwrap();
    let ten_over_f = graph.div(10.0, f).unwrap();
    let g = graph.add(half, ten_over_f).unwrap();

    graph.backward(g).unwrap();

    assert_abs_diff_eq!(graph.data(g).unwrap(), 24.70408163265306, epsilon = 1e-9);
    assert_abs_diff_eq!(graph.grad(a).unwrap(), 138.83381924198252, epsilon = 1e-9);
    assert_abs_diff_eq!(graph.grad(b).unwrap(), 645.5772594752186, epsilon = 1e-9);
}

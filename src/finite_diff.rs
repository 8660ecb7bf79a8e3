//! Finite difference utilities for gradient verification.
//!
//! Provides numerical gradients to check the backward pass against.

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::{Graph, NodeId};

/// Compute gradients using central finite differences.
///
/// # Arguments
/// * `f` - Function that takes a slice of variable values and returns a scalar
/// * `point` - The point at which to compute gradients
/// * `eps` - Step size (typically 1e-7 to 1e-5)
///
/// # Example
/// ```
/// use micrograd::finite_diff_grad;
///
/// // f(x, y) = x^2 + y^2
/// let f = |v: &[f64]| v[0] * v[0] + v[1] * v[1];
/// let grads = finite_diff_grad(f, &[3.0, 4.0], 1e-7);
///
/// assert!((grads[0] - 6.0).abs() < 1e-5);
/// assert!((grads[1] - 8.0).abs() < 1e-5);
/// ```
pub fn finite_diff_grad<F>(f: F, point: &[f64], eps: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let result: std::result::Result<_, std::convert::Infallible> =
        try_finite_diff_grad(|v| Ok(f(v)), point, eps);
    match result {
        Ok(grads) => grads,
        Err(never) => match never {},
    }
}

/// Same as [`finite_diff_grad`] for a function that can fail.
pub fn try_finite_diff_grad<F, E>(
    mut f: F,
    point: &[f64],
    eps: f64,
) -> std::result::Result<Vec<f64>, E>
where
    F: FnMut(&[f64]) -> std::result::Result<f64, E>,
{
    let mut grads = Vec::with_capacity(point.len());
    let mut perturbed = point.to_vec();

    for i in 0..point.len() {
        // Central difference: (f(x + eps) - f(x - eps)) / (2 * eps)
        perturbed[i] = point[i] + eps;
        let f_plus = f(&perturbed)?;

        perturbed[i] = point[i] - eps;
        let f_minus = f(&perturbed)?;

        perturbed[i] = point[i]; // restore

        grads.push((f_plus - f_minus) / (2.0 * eps));
    }

    Ok(grads)
}

/// Numerical d(root)/d(leaf) for each of `leaves`, in order.
///
/// Leaf values are perturbed through [`Graph::forward_with`], so the graph is not
/// modified and its gradients are left as they are.
pub fn numerical_gradients(
    graph: &Graph,
    root: NodeId,
    leaves: &[NodeId],
    eps: f64,
) -> Result<Vec<f64>> {
    let point = leaves
        .iter()
        .map(|&leaf| graph.data(leaf))
        .collect::<Result<Vec<_>>>()?;

    let mut overrides = HashMap::with_capacity(leaves.len());
    try_finite_diff_grad(
        |values| {
            overrides.clear();
            overrides.extend(leaves.iter().copied().zip(values.iter().copied()));
            graph.forward_with(root, &overrides)
        },
        &point,
        eps,
    )
}

/// Compute the maximum absolute difference between two gradient vectors.
///
/// Panics if the lengths differ.
pub fn max_grad_error(grad1: &[f64], grad2: &[f64]) -> f64 {
    assert_eq!(grad1.len(), grad2.len());
    grad1
        .iter()
        .zip(grad2.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_finite_diff_quadratic() {
        // f(x, y) = x^2 + 2*x*y + y^2
        // df/dx = df/dy = 2x + 2y
        let f = |v: &[f64]| v[0] * v[0] + 2.0 * v[0] * v[1] + v[1] * v[1];
        let grads = finite_diff_grad(f, &[1.0, 2.0], 1e-7);

        assert_abs_diff_eq!(grads[0], 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grads[1], 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_try_finite_diff_propagates_errors() {
        let result: std::result::Result<Vec<f64>, String> =
            try_finite_diff_grad(|_| Err("boom".to_string()), &[1.0], 1e-6);
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn test_numerical_gradients_on_graph() {
        let mut graph = Graph::new();
        let x = graph.value(3.0);
        let y = graph.value(-2.0);
        // f = x^2 * y
        let x2 = graph.pow(x, 2.0).unwrap();
        let f = graph.mul(x2, y).unwrap();

        let grads = numerical_gradients(&graph, f, &[x, y], 1e-6).unwrap();
        assert_abs_diff_eq!(grads[0], 2.0 * 3.0 * -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grads[1], 9.0, epsilon = 1e-5);

        // Forward values and gradients are untouched
        assert_eq!(graph.data(x).unwrap(), 3.0);
        assert_eq!(graph.data(f).unwrap(), -18.0);
        assert_eq!(graph.grad(x).unwrap(), 0.0);
    }

    #[test]
    fn test_max_grad_error() {
        let g1 = vec![1.0, 2.0, 3.0];
        let g2 = vec![1.1, 2.0, 2.8];

        let err = max_grad_error(&g1, &g2);
        assert_abs_diff_eq!(err, 0.2, epsilon = 1e-10);
    }
}

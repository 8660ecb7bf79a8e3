// op.rs
// Backward rules for the scalar graph.
// Every node records which operation produced it. The engine dispatches on this
// tag both to compute the forward value and to distribute the upstream gradient
// to the node inputs (chain rule: local derivative times upstream gradient).

/// Operation that produced a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Input created directly by the caller. Backward is a no-op.
    Leaf,
    Add,
    Mul,
    /// Raise to a constant exponent. The exponent is never a node.
    Pow { exponent: f64 },
    ReLU,
    /// Node built from explicit parts with a caller supplied tag.
    /// It keeps the graph structure but propagates nothing.
    Custom(String),
}

impl Op {
    // Get number of inputs this operator expects, `None` when any count is allowed.
    pub fn num_inputs(&self) -> Option<usize> {
        match self {
            Op::Leaf => Some(0),
            Op::Add | Op::Mul => Some(2),
            Op::Pow { .. } | Op::ReLU => Some(1),
            Op::Custom(_) => None,
        }
    }

    /// Tag shown for this operation. Empty for leaves.
    pub fn tag(&self) -> String {
        match self {
            Op::Leaf => String::new(),
            Op::Add => "+".to_string(),
            Op::Mul => "*".to_string(),
            Op::Pow { exponent } => format!("**{}", exponent),
            Op::ReLU => "ReLU".to_string(),
            Op::Custom(tag) => tag.clone(),
        }
    }

    /// Forward value from the input values.
    ///
    /// Returns `None` for leaves and custom nodes, whose value is not derived
    /// from their inputs.
    pub fn compute(&self, inputs: &[f64]) -> Option<f64> {
        match (self, inputs) {
            (Op::Add, [a, b]) => Some(a + b),
            (Op::Mul, [a, b]) => Some(a * b),
            (Op::Pow { exponent }, [a]) => Some(a.powf(*exponent)),
            (Op::ReLU, [a]) => Some(a.max(0.0)),
            _ => None,
        }
    }

    /// Contribution of the upstream gradient to each input, in input order.
    ///
    /// `output` is the forward value of the node itself. Leaves and custom
    /// nodes contribute nothing, so the returned vector is empty for them.
    pub fn gradient(&self, grad_output: f64, inputs: &[f64], output: f64) -> Vec<f64> {
        match (self, inputs) {
            // d(a+b)/da = d(a+b)/db = 1
            (Op::Add, [_, _]) => vec![grad_output, grad_output],
            // d(a*b)/da = b, d(a*b)/db = a
            (Op::Mul, [a, b]) => vec![b * grad_output, a * grad_output],
            // d(a^k)/da = k * a^(k-1)
            (Op::Pow { exponent }, [a]) => {
                vec![exponent * a.powf(exponent - 1.0) * grad_output]
            }
            (Op::ReLU, [_]) => {
                let mask = if output > 0.0 { 1.0 } else { 0.0 };
                vec![mask * grad_output]
            }
            _ => Vec::new(),
        }
    }
}

use super::binder::BufferRole;
use crate::expression::{Token, TokenFamily, TokenType};
use isaac_types::{NumericType, Scalar, Shape, Stride};

/// Axes, among the first `num_idxs`, that need a runtime stride argument
/// when indexing a buffer — every axis except one whose stride is zero
/// (a broadcast axis never advances, so it needs no kernel argument at
/// all). Shared between `SymbolicObject::at`'s emitted expression and the
/// generation layer's buffer-argument declaration/binding, so the two stay
/// in lockstep (spec.md §4.3's enqueue order: `ptr, start, stride_axis_i`
/// for each such axis).
pub fn bound_stride_axes(stride: &Stride, num_idxs: usize) -> Vec<usize> {
    (0..num_idxs).filter(|&axis| axis < stride.len() && stride[axis] != 0).collect()
}

/// Per-node symbolic annotation built once by the single DFS pass of §4.1.
/// The spec describes this as an inheritance tag plus a bag of named
/// string-template "lambdas"; §9 explicitly permits representing those
/// lambdas as small AST fragments instead of raw text, which is what this
/// does — `SymbolicKind` is the typed equivalent of the inheritance tag,
/// and the `at`/`scalar_expr` methods below are the typed equivalent of the
/// `at(i)`/`at(i,j)` lambdas and the operator `evaluate` lambda.
#[derive(Clone, Debug)]
pub enum SymbolicKind {
    /// A scalar immediate — kernel argument, no memory access.
    HostScalar { name: String, value: Scalar },
    /// A view onto a buffer.
    Buffer {
        name: String,
        dtype: NumericType,
        shape: Shape,
        stride: Stride,
        start_offset: i64,
        buffer_id: u64,
        role: BufferRole,
    },
    /// `reshape`/`trans`/`diag_vector`/`diag_matrix` — re-maps `at(..)`
    /// onto the child's access pattern instead of computing anything.
    AccessModifier { modifier: TokenType, child: usize, old_stride: Option<Stride> },
    /// A `BinaryArithmetic`/`UnaryArithmetic`/comparison/transcendental
    /// operator.
    Operator { token: Token, lhs: usize, rhs: usize },
    /// A `Reduce`/`ReduceRows`/`ReduceColumns` node.
    Reduction { token: Token, axis: Option<usize>, lhs: usize, rhs: usize, accumulator: String },
    /// The top-level `Assign` node.
    Assign { lhs: usize, rhs: usize },
}

#[derive(Clone, Debug)]
pub struct SymbolicObject {
    pub node_idx: usize,
    pub kind: SymbolicKind,
}

impl SymbolicObject {
    /// Name used to refer to this node's value in generated C (kernel
    /// argument name for leaves, a fresh register name for intermediate
    /// arithmetic results).
    pub fn name(&self) -> String {
        match &self.kind {
            SymbolicKind::HostScalar { name, .. } => name.clone(),
            SymbolicKind::Buffer { name, .. } => name.clone(),
            _ => format!("tmp{}", self.node_idx),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SymbolicKind::HostScalar { .. } | SymbolicKind::Buffer { .. })
    }

    pub fn is_reduction(&self) -> bool {
        matches!(self.kind, SymbolicKind::Reduction { .. })
    }

    pub fn family(&self) -> Option<TokenFamily> {
        match &self.kind {
            SymbolicKind::Operator { token, .. } => Some(token.family),
            SymbolicKind::Reduction { token, .. } => Some(token.family),
            SymbolicKind::Assign { .. } => Some(TokenFamily::Assign),
            _ => None,
        }
    }

    /// The `at(i)` / `at(i,j)` access expression for a buffer or an access
    /// modifier wrapping one, rewriting indices per the modifier's rule
    /// (§4.1):
    /// - `reshape`: recomputes a flat offset using the old strides, then
    ///   re-derives multi-index positions from the new shape.
    /// - `trans`: swaps the two index expressions before delegating.
    /// - `diag_vector`: reads the (i,i) entry of the underlying matrix.
    /// - `diag_matrix`: off-diagonal reads are the zero literal; on-diagonal
    ///   delegate to the underlying vector at index i.
    pub fn at(&self, table: &super::SymbolicTable, idxs: &[&str]) -> String {
        match &self.kind {
            SymbolicKind::Buffer { name, stride, .. } => {
                // `start_offset`/`stride` are bound as runtime kernel
                // arguments (§4.3's enqueue order), not baked here as
                // literals — two views differing only in offset or stride
                // can then safely share one compiled, cached program.
                let mut expr = format!("{name}_start");
                for axis in bound_stride_axes(stride, idxs.len()) {
                    expr.push_str(&format!(" + ({})*{name}_stride{axis}", idxs[axis]));
                }
                format!("{name}[{expr}]")
            }
            SymbolicKind::AccessModifier { modifier, child, old_stride } => {
                let child_obj = table.get(*child);
                match modifier {
                    TokenType::Trans if idxs.len() == 2 => {
                        child_obj.at(table, &[idxs[1], idxs[0]])
                    }
                    TokenType::DiagVector if idxs.len() == 1 => {
                        child_obj.at(table, &[idxs[0], idxs[0]])
                    }
                    TokenType::DiagMatrix if idxs.len() == 2 => {
                        format!("(({}) == ({}) ? {} : 0)", idxs[0], idxs[1], child_obj.at(table, &[idxs[0]]))
                    }
                    TokenType::Reshape => {
                        // Flatten the new multi-index using the new node's
                        // own stride (already stored on this object as the
                        // buffer-like `stride` field is not present here;
                        // reshape carries the pre-reshape stride so we can
                        // recompute a flat linear index and re-split it
                        // along the child's strides).
                        let old = old_stride.clone().unwrap_or_default();
                        let flat = idxs
                            .iter()
                            .enumerate()
                            .map(|(axis, idx)| format!("({idx})*{}", if axis < old.len() { old[axis] } else { 0 }))
                            .collect::<Vec<_>>()
                            .join(" + ");
                        child_obj.at(table, &[&flat])
                    }
                    _ => child_obj.at(table, idxs),
                }
            }
            _ => format!("/* not a leaf or access modifier: node {} */", self.node_idx),
        }
    }

    /// The scalar host-argument expression (no indices).
    pub fn host_value(&self) -> Option<String> {
        match &self.kind {
            SymbolicKind::HostScalar { name, .. } => Some(name.clone()),
            _ => None,
        }
    }
}

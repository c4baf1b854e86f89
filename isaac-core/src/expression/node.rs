use super::token::Token;
use crate::driver::BufferHandle;
use isaac_types::{NumericType, Scalar, Shape, Stride};

/// A stable integer id assigned by the `Binder` (§3, §4.1) to a distinct
/// buffer handle, separately for read ("bound") and write ("assignee")
/// slots.
pub type BufferId = u64;

/// One node of the flat expression-tree arena (§3). Child edges are plain
/// indices into the owning `Tree`'s node vector rather than pointers or
/// `Rc`s — this is what makes the rebased-concatenation builder in
/// `Tree::compose` a pair of `Vec` operations plus an index fixup instead of
/// a deep clone (§9).
#[derive(Clone, Debug)]
pub enum Node {
    /// Sentinel used for a unary operator's unused right operand.
    Invalid,
    ValueScalar { dtype: NumericType, value: Scalar },
    DenseArray {
        dtype: NumericType,
        shape: Shape,
        stride: Stride,
        start_offset: i64,
        buffer: BufferHandle,
    },
    Composite {
        lhs: usize,
        rhs: usize,
        token: Token,
        dtype: NumericType,
        shape: Shape,
    },
}

impl Node {
    pub fn dtype(&self) -> NumericType {
        match self {
            Node::Invalid => NumericType::Invalid,
            Node::ValueScalar { dtype, .. } => *dtype,
            Node::DenseArray { dtype, .. } => *dtype,
            Node::Composite { dtype, .. } => *dtype,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Node::Invalid | Node::ValueScalar { .. } => Shape::scalar(),
            Node::DenseArray { shape, .. } => shape.clone(),
            Node::Composite { shape, .. } => shape.clone(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Node::Invalid)
    }

    /// Children strictly below this node's own index, if any — used to
    /// check invariant 1 of §3/§8 after every builder call.
    pub fn children(&self) -> Option<(usize, usize)> {
        match self {
            Node::Composite { lhs, rhs, .. } => Some((*lhs, *rhs)),
            _ => None,
        }
    }
}

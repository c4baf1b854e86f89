use super::kind::Kind;
use crate::expression::{Node, Token, TokenFamily, TokenType, Tree};
use std::collections::{HashMap, HashSet};

/// Bottom-up classification (§4.2 rules 1-6). Populates `materialize` with
/// the node indices that must become temporaries, and returns the kind of
/// `idx` once its (possibly materialized) children are accounted for.
pub fn classify(tree: &Tree, idx: usize, materialize: &mut HashSet<usize>, memo: &mut HashMap<usize, Kind>) -> Kind {
    if let Some(k) = memo.get(&idx) {
        return *k;
    }
    let kind = match tree.node(idx) {
        Node::Invalid | Node::ValueScalar { .. } => Kind::ElementWise1D,
        Node::DenseArray { shape, .. } => Kind::from_shape(shape),
        Node::Composite { lhs, rhs, token, shape, .. } => {
            classify_composite(tree, idx, *lhs, *rhs, *token, shape, materialize, memo)
        }
    };
    memo.insert(idx, kind);
    kind
}

fn classify_composite(
    tree: &Tree,
    idx: usize,
    lhs: usize,
    rhs: usize,
    token: Token,
    shape: &isaac_types::Shape,
    materialize: &mut HashSet<usize>,
    memo: &mut HashMap<usize, Kind>,
) -> Kind {
    match token.family {
        TokenFamily::MatrixProduct => {
            // Rule 1: force both children to be materialized dense arrays,
            // absorbing a `trans` wrapper rather than materializing through
            // it (§4.3.5 "choosing the correct transpose variant").
            let (a_idx, a_trans) = resolve_matrix_product_operand(tree, lhs);
            let (b_idx, b_trans) = resolve_matrix_product_operand(tree, rhs);
            if !matches!(tree.node(a_idx), Node::DenseArray { .. }) {
                materialize.insert(a_idx);
            }
            if !matches!(tree.node(b_idx), Node::DenseArray { .. }) {
                materialize.insert(b_idx);
            }
            Kind::matrix_product(a_trans, b_trans)
        }
        TokenFamily::Reduce | TokenFamily::ReduceRows | TokenFamily::ReduceColumns => {
            // Rule 2: the reduced sub-expression must be element-wise;
            // otherwise materialize it first.
            let child_kind = classify(tree, lhs, materialize, memo);
            if !child_kind.is_elementwise() {
                materialize.insert(lhs);
            }
            if !tree.node(rhs).is_invalid() {
                let rk = classify(tree, rhs, materialize, memo);
                if !rk.is_elementwise() {
                    materialize.insert(rhs);
                }
            }
            match token.family {
                TokenFamily::Reduce => Kind::Reduce1D,
                TokenFamily::ReduceRows => Kind::Reduce2DRows,
                _ => Kind::Reduce2DCols,
            }
        }
        TokenFamily::AccessModifier => classify_access_modifier(tree, lhs, token.ty, shape, materialize, memo),
        TokenFamily::UnaryArithmetic | TokenFamily::BinaryArithmetic => {
            let lk = classify(tree, lhs, materialize, memo);
            let rk = if tree.node(rhs).is_invalid() { lk } else { classify(tree, rhs, materialize, memo) };

            // Rule 5: any matrix-product node reached here is not the
            // direct right-hand side of an assignment (that case is
            // intercepted by `schedule::schedule` before recursing), so it
            // must be materialized.
            if lk.is_matrix_product() {
                materialize.insert(lhs);
            }
            if rk.is_matrix_product() {
                materialize.insert(rhs);
            }

            let fusable = (lk.is_elementwise() && rk.is_elementwise())
                || (lk.is_elementwise() && rk.is_reduction())
                || (lk.is_reduction() && rk.is_elementwise());

            if !fusable {
                // Materialize whichever side isn't already flagged above,
                // preferring to keep the higher-ranked side in this kernel.
                if lk.rank() >= rk.rank() {
                    materialize.insert(rhs);
                } else {
                    materialize.insert(lhs);
                }
            }

            if lk.is_elementwise() && rk.is_elementwise() {
                // Rule 6 default: the op's own shape decides 1D vs 2D.
                Kind::from_shape(shape)
            } else {
                Kind::greater(lk, rk)
            }
        }
        TokenFamily::Assign => {
            unreachable!("Assign is classified at the schedule entry point, not recursively")
        }
    }
}

fn classify_access_modifier(
    tree: &Tree,
    child: usize,
    modifier: TokenType,
    shape: &isaac_types::Shape,
    materialize: &mut HashSet<usize>,
    memo: &mut HashMap<usize, Kind>,
) -> Kind {
    let child_kind = classify(tree, child, materialize, memo);
    match modifier {
        TokenType::Reshape => {
            // Rule 3: reshape is only representable on a contiguous
            // producer; force materialization otherwise.
            if !child_kind.is_elementwise() {
                materialize.insert(child);
            }
            Kind::from_shape(shape)
        }
        _ => child_kind,
    }
}

/// Follows a `trans` access modifier down to the dense array it wraps,
/// absorbing it into the transpose flag instead of treating it as a
/// materialization boundary. Non-`trans` composites are returned as-is (the
/// caller will materialize them since they aren't dense arrays).
pub fn resolve_matrix_product_operand(tree: &Tree, idx: usize) -> (usize, bool) {
    if let Node::Composite { lhs, token, .. } = tree.node(idx) {
        if token.family == TokenFamily::AccessModifier && token.ty == TokenType::Trans {
            return (*lhs, true);
        }
    }
    (idx, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, Context, SimBackend};
    use isaac_types::{Shape, Stride};
    use std::sync::Arc;

    fn ctx() -> Arc<dyn Context> {
        SimBackend::new_queue(Backend::OpenClLike).0
    }

    fn dense(ctx: &Arc<dyn Context>, shape: Vec<i64>) -> Tree {
        let shape = Shape::new(shape);
        let stride = Stride::new(vec![1; shape.len()]);
        let bytes = (shape.product().max(1) as usize) * isaac_types::NumericType::Float32.size_of();
        let buffer = ctx.allocate(bytes).unwrap();
        Tree::leaf(
            Node::DenseArray { dtype: isaac_types::NumericType::Float32, shape, stride, start_offset: 0, buffer },
            ctx.clone(),
        )
    }

    #[test]
    fn resolve_matrix_product_operand_absorbs_trans() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4, 4]);
        let transposed =
            Tree::compose(&a, Token::trans(), &a, isaac_types::NumericType::Float32, Shape::new(vec![4, 4])).unwrap();
        let (idx, trans) = resolve_matrix_product_operand(&transposed, transposed.root());
        assert!(trans);
        assert_eq!(idx, a.root());
    }

    #[test]
    fn resolve_matrix_product_operand_passes_through_plain_node() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4, 4]);
        let (idx, trans) = resolve_matrix_product_operand(&a, a.root());
        assert!(!trans);
        assert_eq!(idx, a.root());
    }

    #[test]
    fn reduce_materializes_non_elementwise_operand() {
        let ctx = ctx();
        let a = dense(&ctx, vec![8, 8]);
        let b = dense(&ctx, vec![8, 8]);
        let mm = Tree::compose(
            &a,
            Token::matrix_product(false, false),
            &b,
            isaac_types::NumericType::Float32,
            Shape::new(vec![8, 8]),
        )
        .unwrap();
        let reduced = Tree::unary(&mm, Token::sum(None), isaac_types::NumericType::Float32, Shape::new(vec![1])).unwrap();

        let mut materialize = std::collections::HashSet::new();
        let mut memo = std::collections::HashMap::new();
        let kind = classify(&reduced, reduced.root(), &mut materialize, &mut memo);
        assert_eq!(kind, Kind::Reduce1D);
        assert!(materialize.contains(&mm.root()));
    }

    #[test]
    fn elementwise_plus_reduction_fuses_without_materializing() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let b = dense(&ctx, vec![64]);
        let reduced = Tree::unary(&b, Token::sum(None), isaac_types::NumericType::Float32, Shape::new(vec![1])).unwrap();
        let combined =
            Tree::compose(&reduced, Token::add(), &a, isaac_types::NumericType::Float32, Shape::new(vec![64]))
                .unwrap();

        let mut materialize = std::collections::HashSet::new();
        let mut memo = std::collections::HashMap::new();
        let kind = classify(&combined, combined.root(), &mut materialize, &mut memo);
        assert!(!materialize.contains(&reduced.root()));
        assert_eq!(kind, Kind::greater(Kind::ElementWise1D, Kind::Reduce1D));
    }
}

use super::classify::{classify, resolve_matrix_product_operand};
use super::kind::Kind;
use crate::error::{Error, Result};
use crate::expression::{Node, Token, TokenFamily, Tree};
use isaac_types::{Shape, Stride};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One standalone tree ready for code generation, paired with the kernel
/// kind its template dispatch is keyed on (§4.2, §4.3).
#[derive(Debug)]
pub struct ScheduledKernel {
    pub kind: Kind,
    pub tree: Tree,
}

/// The output of `schedule`: zero or more temporaries that must be evaluated
/// (in order) before the final kernel, which writes to the user's original
/// assignee (§4.2 "Materialization").
#[derive(Debug)]
pub struct ScheduleResult {
    pub temporaries: Vec<ScheduledKernel>,
    pub final_kernel: ScheduledKernel,
}

/// Splits `tree` — which must be rooted at an assignment — into a sequence
/// of temporaries plus a final kernel, applying §4.2 rules 1-6.
pub fn schedule(tree: &Tree) -> Result<ScheduleResult> {
    let (_, rhs) = root_assign_parts(tree)?;
    let (_, materialize) = classify_root(tree)?;

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    discover_breakpoints(tree, rhs, &materialize, &mut visited, &mut order);
    debug!(breakpoints = order.len(), "schedule");

    let mut working = tree.clone();
    let mut temporaries = Vec::with_capacity(order.len());
    for bp_idx in order {
        let dtype = working.node(bp_idx).dtype();
        let shape = working.node(bp_idx).shape();
        let stride = contiguous_stride(&shape);
        let bytes = (shape.product().max(1) as usize) * dtype.size_of();
        let buffer = working.context().allocate(bytes)?;
        let temp_leaf = Node::DenseArray { dtype, shape: shape.clone(), stride, start_offset: 0, buffer };

        let extracted = extract_subtree(&working, bp_idx);
        let assignee = Tree::leaf(temp_leaf.clone(), working.context().clone());
        let assign_tree = Tree::compose(&assignee, Token::assign(), &extracted, dtype, shape.clone())?;
        let (kind, _) = classify_root(&assign_tree)?;
        temporaries.push(ScheduledKernel { kind, tree: assign_tree });

        working.replace_node(bp_idx, temp_leaf);
    }

    let (final_kind, _) = classify_root(&working)?;
    Ok(ScheduleResult { temporaries, final_kernel: ScheduledKernel { kind: final_kind, tree: working } })
}

fn root_assign_parts(tree: &Tree) -> Result<(usize, usize)> {
    match tree.node(tree.root()) {
        Node::Composite { lhs, rhs, token, .. } if token.family == TokenFamily::Assign => Ok((*lhs, *rhs)),
        _ => Err(Error::SemanticError("schedule: tree root must be an assignment".into())),
    }
}

/// Classifies the right-hand side of `tree`'s top-level assignment,
/// special-casing a direct matrix-product (rule 5: "an assignment of a
/// matrix-product sub-expression to a buffer does not create a temporary")
/// before falling back to the general recursive classifier for everything
/// else.
fn classify_root(tree: &Tree) -> Result<(Kind, HashSet<usize>)> {
    let (_, rhs) = root_assign_parts(tree)?;
    let mut materialize = HashSet::new();
    let mut memo = HashMap::new();
    let kind = match tree.node(rhs) {
        Node::Composite { lhs: mm_lhs, rhs: mm_rhs, token, .. } if token.family == TokenFamily::MatrixProduct => {
            let (a_idx, a_trans) = resolve_matrix_product_operand(tree, *mm_lhs);
            let (b_idx, b_trans) = resolve_matrix_product_operand(tree, *mm_rhs);
            if !matches!(tree.node(a_idx), Node::DenseArray { .. }) {
                materialize.insert(a_idx);
            }
            if !matches!(tree.node(b_idx), Node::DenseArray { .. }) {
                materialize.insert(b_idx);
            }
            Kind::matrix_product(a_trans, b_trans)
        }
        _ => classify(tree, rhs, &mut materialize, &mut memo),
    };
    Ok((kind, materialize))
}

/// Child-before-parent traversal of the breakpoints in `materialize`,
/// restricted to the left-to-right order they occur in — a nested
/// breakpoint must produce its temporary before the outer one that
/// references it can be extracted.
fn discover_breakpoints(
    tree: &Tree,
    idx: usize,
    materialize: &HashSet<usize>,
    visited: &mut HashSet<usize>,
    out: &mut Vec<usize>,
) {
    if visited.contains(&idx) {
        return;
    }
    visited.insert(idx);
    if let Some((lhs, rhs)) = tree.node(idx).children() {
        discover_breakpoints(tree, lhs, materialize, visited, out);
        if !tree.node(rhs).is_invalid() {
            discover_breakpoints(tree, rhs, materialize, visited, out);
        }
    }
    if materialize.contains(&idx) {
        out.push(idx);
    }
}

/// Copies the sub-tree rooted at `root_idx` out of `tree` into its own
/// arena, renumbering indices by post-order position (children are always
/// visited, and therefore remapped, before their parent).
fn extract_subtree(tree: &Tree, root_idx: usize) -> Tree {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    collect_postorder(tree, root_idx, &mut visited, &mut order);

    let mut remap = HashMap::with_capacity(order.len());
    let mut nodes = Vec::with_capacity(order.len());
    for &old in &order {
        let new_idx = nodes.len();
        let new_node = match tree.node(old) {
            Node::Composite { lhs, rhs, token, dtype, shape } => {
                Node::Composite { lhs: remap[lhs], rhs: remap[rhs], token: *token, dtype: *dtype, shape: shape.clone() }
            }
            other => other.clone(),
        };
        nodes.push(new_node);
        remap.insert(old, new_idx);
    }
    let root = nodes.len() - 1;
    Tree::from_parts(nodes, root, tree.context().clone())
}

/// Unlike `Tree::dfs_postorder`, this always visits `rhs` — including an
/// `Invalid` sentinel — since the extracted arena still needs a slot for it.
fn collect_postorder(tree: &Tree, idx: usize, visited: &mut HashSet<usize>, order: &mut Vec<usize>) {
    if visited.contains(&idx) {
        return;
    }
    visited.insert(idx);
    if let Some((lhs, rhs)) = tree.node(idx).children() {
        collect_postorder(tree, lhs, visited, order);
        collect_postorder(tree, rhs, visited, order);
    }
    order.push(idx);
}

/// Column-major contiguous strides for a freshly allocated temporary (§3:
/// shape `(M, N)` pairs with stride `(1, M)`).
fn contiguous_stride(shape: &Shape) -> Stride {
    let mut strides = Vec::with_capacity(shape.len());
    let mut acc: i64 = 1;
    for &extent in shape.iter() {
        strides.push(acc);
        acc *= extent.max(1);
    }
    Stride::new(strides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, Context, SimBackend};
    use crate::expression::Node;
    use isaac_types::NumericType;
    use std::sync::Arc;

    fn ctx() -> Arc<dyn Context> {
        SimBackend::new_queue(Backend::OpenClLike).0
    }

    fn dense(ctx: &Arc<dyn Context>, shape: Vec<i64>) -> Tree {
        let shape = Shape::new(shape);
        let stride = contiguous_stride(&shape);
        let bytes = (shape.product().max(1) as usize) * NumericType::Float32.size_of();
        let buffer = ctx.allocate(bytes).unwrap();
        Tree::leaf(
            Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset: 0, buffer },
            ctx.clone(),
        )
    }

    #[test]
    fn plain_elementwise_has_no_breakpoints() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let b = dense(&ctx, vec![64]);
        let sum = Tree::compose(&a, Token::add(), &b, NumericType::Float32, Shape::new(vec![64])).unwrap();
        let out = dense(&ctx, vec![64]);
        let assign = Tree::compose(&out, Token::assign(), &sum, NumericType::Float32, Shape::new(vec![64])).unwrap();

        let result = schedule(&assign).unwrap();
        assert!(result.temporaries.is_empty());
        assert_eq!(result.final_kernel.kind, Kind::ElementWise1D);
    }

    #[test]
    fn nested_matrix_product_in_elementwise_creates_one_temporary() {
        let ctx = ctx();
        let a = dense(&ctx, vec![8, 8]);
        let b = dense(&ctx, vec![8, 8]);
        let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![8, 8]))
            .unwrap();
        let c = dense(&ctx, vec![8, 8]);
        let sum = Tree::compose(&mm, Token::add(), &c, NumericType::Float32, Shape::new(vec![8, 8])).unwrap();
        let out = dense(&ctx, vec![8, 8]);
        let assign = Tree::compose(&out, Token::assign(), &sum, NumericType::Float32, Shape::new(vec![8, 8])).unwrap();

        let result = schedule(&assign).unwrap();
        assert_eq!(result.temporaries.len(), 1);
        assert_eq!(result.temporaries[0].kind, Kind::MatrixProductNN);
        assert_eq!(result.final_kernel.kind, Kind::ElementWise2D);
    }

    #[test]
    fn direct_matrix_product_assignment_has_no_temporary() {
        let ctx = ctx();
        let a = dense(&ctx, vec![8, 8]);
        let b = dense(&ctx, vec![8, 8]);
        let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![8, 8]))
            .unwrap();
        let out = dense(&ctx, vec![8, 8]);
        let assign = Tree::compose(&out, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![8, 8])).unwrap();

        let result = schedule(&assign).unwrap();
        assert!(result.temporaries.is_empty());
        assert_eq!(result.final_kernel.kind, Kind::MatrixProductNN);
    }
}

use super::node::Node;
use super::token::Token;
use crate::driver::Context;
use crate::error::{Error, Result};
use isaac_types::{NumericType, Shape};
use std::sync::Arc;
use tracing::debug;

/// Flat sequence of nodes plus a designated root (§3). Trees are short-lived
/// — the duration of one API call (§3 Lifecycle) — so this type derives
/// `Clone` cheaply via `Vec` copy rather than trying to be zero-copy.
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
    context: Arc<dyn Context>,
}

impl Tree {
    pub fn leaf(node: Node, context: Arc<dyn Context>) -> Self {
        Tree { nodes: vec![node], root: 0, context }
    }

    /// Builds a tree from an already-topologically-ordered node vector
    /// (used by the scheduler when extracting a sub-tree into its own
    /// standalone arena, §4.2 Materialization).
    pub(crate) fn from_parts(nodes: Vec<Node>, root: usize, context: Arc<dyn Context>) -> Self {
        Tree { nodes, root, context }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn context(&self) -> &Arc<dyn Context> {
        &self.context
    }

    pub fn dtype(&self) -> NumericType {
        self.nodes[self.root].dtype()
    }

    pub fn shape(&self) -> Shape {
        self.nodes[self.root].shape()
    }

    /// Appends `other`'s nodes after `self`'s, rebasing every child index in
    /// the moved region by `self.len()` (§4.1 "Construction contracts").
    /// Returns the rebased root index of `other` within the combined arena.
    fn append_rebased(&mut self, other: &Tree) -> usize {
        let shift = self.nodes.len();
        for node in other.nodes.iter() {
            let rebased = match node {
                Node::Composite { lhs, rhs, token, dtype, shape } => Node::Composite {
                    lhs: lhs + shift,
                    rhs: rhs + shift,
                    token: *token,
                    dtype: *dtype,
                    shape: shape.clone(),
                },
                other => other.clone(),
            };
            self.nodes.push(rebased);
        }
        other.root + shift
    }

    /// One of the four overloaded composers (§4.1): `tree ⊕ tree`. Unary
    /// operators should pass the same tree as both operands with `rhs`
    /// replaced by a single `Node::Invalid` tree via `Tree::unary`.
    pub fn compose(lhs: &Tree, token: Token, rhs: &Tree, dtype: NumericType, shape: Shape) -> Result<Tree> {
        debug!(?token, lhs_len = lhs.len(), rhs_len = rhs.len(), "compose");
        let mut combined = lhs.clone();
        let rhs_root = combined.append_rebased(rhs);
        let lhs_root = lhs.root;
        let new_root = combined.nodes.len();
        combined.nodes.push(Node::Composite { lhs: lhs_root, rhs: rhs_root, token, dtype, shape });
        combined.root = new_root;
        combined.check_invariants()?;
        Ok(combined)
    }

    /// `tree ⊕ node` — the node becomes a one-element tree first.
    pub fn compose_with_node(lhs: &Tree, token: Token, rhs: Node, dtype: NumericType, shape: Shape) -> Result<Tree> {
        let rhs_tree = Tree::leaf(rhs, lhs.context.clone());
        Tree::compose(lhs, token, &rhs_tree, dtype, shape)
    }

    /// Unary composer: `Invalid` fills the unused right operand (§3, §4.1).
    pub fn unary(operand: &Tree, token: Token, dtype: NumericType, shape: Shape) -> Result<Tree> {
        Tree::compose_with_node(operand, token, Node::Invalid, dtype, shape)
    }

    /// Checks invariant 1 of §3/§8: every composite's children are strictly
    /// less than its own index.
    fn check_invariants(&self) -> Result<()> {
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some((lhs, rhs)) = node.children() {
                if lhs >= idx || rhs >= idx {
                    return Err(Error::SemanticError(format!(
                        "composite node {idx} has non-topological child indices ({lhs}, {rhs})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Post-order (default) depth-first traversal. `recurse` decides
    /// whether to descend into a composite's children — the symbolic
    /// extractor uses this to stop at access-modifier boundaries (§4.1).
    pub fn dfs_postorder<F>(&self, start: usize, mut recurse: F) -> Vec<usize>
    where
        F: FnMut(usize, &Node) -> bool,
    {
        let mut order = Vec::new();
        self.dfs_visit(start, &mut recurse, &mut order);
        order
    }

    fn dfs_visit<F>(&self, idx: usize, recurse: &mut F, order: &mut Vec<usize>)
    where
        F: FnMut(usize, &Node) -> bool,
    {
        let node = &self.nodes[idx];
        let should_recurse = recurse(idx, node);
        if should_recurse {
            if let Some((lhs, rhs)) = node.children() {
                self.dfs_visit(lhs, recurse, order);
                if !self.nodes[rhs].is_invalid() {
                    self.dfs_visit(rhs, recurse, order);
                }
            }
        }
        order.push(idx);
    }

    /// Breadth-first traversal from `start`, same recurse-predicate contract
    /// as `dfs_postorder`.
    pub fn bfs<F>(&self, start: usize, mut recurse: F) -> Vec<usize>
    where
        F: FnMut(usize, &Node) -> bool,
    {
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            let node = &self.nodes[idx];
            order.push(idx);
            if recurse(idx, node) {
                if let Some((lhs, rhs)) = node.children() {
                    queue.push_back(lhs);
                    if !self.nodes[rhs].is_invalid() {
                        queue.push_back(rhs);
                    }
                }
            }
        }
        order
    }

    /// Replaces the sub-tree rooted at `idx` with a direct reference node
    /// (used by the scheduler to splice in a materialized temporary, §4.2).
    /// The old sub-tree's nodes are left dangling in the arena — harmless,
    /// since trees are rebuilt, not mutated in place, after scheduling.
    pub fn replace_node(&mut self, idx: usize, replacement: Node) {
        self.nodes[idx] = replacement;
    }

    pub fn push_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, SimBackend};
    use isaac_types::Stride;
    use std::sync::Arc;

    fn ctx() -> Arc<dyn Context> {
        SimBackend::new_queue(Backend::OpenClLike).0
    }

    fn dense(ctx: &Arc<dyn Context>, shape: Vec<i64>) -> Tree {
        let shape = Shape::new(shape);
        let stride = Stride::new(vec![1; shape.len()]);
        let bytes = (shape.product().max(1) as usize) * NumericType::Float32.size_of();
        let buffer = ctx.allocate(bytes).unwrap();
        Tree::leaf(Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset: 0, buffer }, ctx.clone())
    }

    #[test]
    fn leaf_tree_has_one_node_rooted_at_zero() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        assert_eq!(a.len(), 1);
        assert_eq!(a.root(), 0);
        assert!(!a.is_empty());
    }

    #[test]
    fn compose_appends_rhs_after_lhs_and_rebases_its_children() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let b = dense(&ctx, vec![4]);
        let c = dense(&ctx, vec![4]);
        let bc = Tree::compose(&b, Token::add(), &c, NumericType::Float32, Shape::new(vec![4])).unwrap();
        let combined = Tree::compose(&a, Token::add(), &bc, NumericType::Float32, Shape::new(vec![4])).unwrap();

        // lhs (`a`) keeps its original index.
        assert_eq!(combined.node(a.root()).dtype(), NumericType::Float32);
        // rhs (`bc`) is appended after `a`'s single node, and its own
        // internal composite's children are shifted along with it.
        let shift = a.len();
        let rebased_bc_root = shift + bc.root();
        match combined.node(rebased_bc_root) {
            Node::Composite { lhs, rhs, .. } => {
                assert_eq!(*lhs, shift + b.root());
                assert_eq!(*rhs, shift + b.len() + c.root());
            }
            other => panic!("expected composite, got {other:?}"),
        }
        assert_eq!(combined.root(), combined.len() - 1);
    }

    #[test]
    fn unary_leaves_the_operand_index_untouched() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let neg = Tree::unary(&a, Token::negate(), NumericType::Float32, Shape::new(vec![4])).unwrap();
        match neg.node(neg.root()) {
            Node::Composite { lhs, rhs, .. } => {
                assert_eq!(*lhs, a.root());
                assert!(neg.node(*rhs).is_invalid());
            }
            other => panic!("expected composite, got {other:?}"),
        }
    }

    #[test]
    fn compose_rejects_a_non_topological_child_index() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let mut bad = a.clone();
        bad.nodes.push(Node::Composite {
            lhs: 5,
            rhs: 5,
            token: Token::add(),
            dtype: NumericType::Float32,
            shape: Shape::new(vec![4]),
        });
        bad.root = bad.nodes.len() - 1;
        assert!(bad.check_invariants().is_err());
    }

    #[test]
    fn dfs_postorder_visits_children_before_parent() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let b = dense(&ctx, vec![4]);
        let sum = Tree::compose(&a, Token::add(), &b, NumericType::Float32, Shape::new(vec![4])).unwrap();
        let order = sum.dfs_postorder(sum.root(), |_, _| true);
        assert_eq!(order.last(), Some(&sum.root()));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn dfs_postorder_skips_invalid_rhs_of_a_unary_node() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let neg = Tree::unary(&a, Token::negate(), NumericType::Float32, Shape::new(vec![4])).unwrap();
        let order = neg.dfs_postorder(neg.root(), |_, _| true);
        assert_eq!(order, vec![a.root(), neg.root()]);
    }

    #[test]
    fn bfs_visits_the_root_before_its_children() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let b = dense(&ctx, vec![4]);
        let sum = Tree::compose(&a, Token::add(), &b, NumericType::Float32, Shape::new(vec![4])).unwrap();
        let order = sum.bfs(sum.root(), |_, _| true);
        assert_eq!(order[0], sum.root());
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn replace_node_overwrites_in_place_without_shifting_other_indices() {
        let ctx = ctx();
        let a = dense(&ctx, vec![4]);
        let b = dense(&ctx, vec![4]);
        let mut sum = Tree::compose(&a, Token::add(), &b, NumericType::Float32, Shape::new(vec![4])).unwrap();
        let replacement = dense(&ctx, vec![4]).nodes[0].clone();
        sum.replace_node(a.root(), replacement);
        assert!(matches!(sum.node(a.root()), Node::DenseArray { .. }));
        assert_eq!(sum.len(), 3);
    }

    #[test]
    fn push_node_returns_the_new_nodes_index() {
        let ctx = ctx();
        let mut a = dense(&ctx, vec![4]);
        let idx = a.push_node(Node::Invalid);
        assert_eq!(idx, 1);
        assert_eq!(a.len(), 2);
    }
}

use super::binder::{Binder, BufferRole};
use super::object::{SymbolicKind, SymbolicObject};
use super::table::SymbolicTable;
use crate::expression::{Node, Token, TokenFamily, TokenType, Tree};
use isaac_types::Stride;
use tracing::debug;

/// Builds the symbolic table for `tree` in a single DFS starting at its
/// root. §4.1 rules, in order:
///   - `VALUE_SCALAR` -> host scalar.
///   - `DENSE_ARRAY` -> buffer, id from the binder.
///   - `COMPOSITE` access modifier -> index-rewriting wrapper.
///   - `COMPOSITE` arithmetic -> operator.
///   - `COMPOSITE` reduction -> reduction, recording axis + neutral element.
pub fn annotate(tree: &Tree) -> SymbolicTable {
    let mut table = SymbolicTable::new(Binder::new());
    visit(tree, tree.root(), BufferRole::Bound, &mut table);
    table
}

fn visit(tree: &Tree, idx: usize, role: BufferRole, table: &mut SymbolicTable) {
    if table.contains(idx) {
        return;
    }
    let node = tree.node(idx);
    match node {
        Node::Invalid => {
            // Sentinel: no symbolic object, never dereferenced downstream.
        }
        Node::ValueScalar { value, .. } => {
            let name = format!("s{idx}");
            table.host_scalar_nodes.push(idx);
            table.insert(SymbolicObject {
                node_idx: idx,
                kind: SymbolicKind::HostScalar { name, value: *value },
            });
        }
        Node::DenseArray { dtype, shape, stride, start_offset, buffer } => {
            let id = table.binder.bind(buffer, role);
            let prefix = match role {
                BufferRole::Bound => "in",
                BufferRole::Assignee => "out",
            };
            let name = format!("{prefix}{id}");
            match role {
                BufferRole::Bound => table.bound_buffer_nodes.push(idx),
                BufferRole::Assignee => table.assignee_buffer_nodes.push(idx),
            }
            table.insert(SymbolicObject {
                node_idx: idx,
                kind: SymbolicKind::Buffer {
                    name,
                    dtype: *dtype,
                    shape: shape.clone(),
                    stride: stride.clone(),
                    start_offset: *start_offset,
                    buffer_id: id,
                    role,
                },
            });
        }
        Node::Composite { lhs, rhs, token, .. } => {
            debug!(idx, ?token, "annotate_composite");
            match token.family {
                TokenFamily::Assign => {
                    visit(tree, *lhs, BufferRole::Assignee, table);
                    visit(tree, *rhs, BufferRole::Bound, table);
                    table.insert(SymbolicObject {
                        node_idx: idx,
                        kind: SymbolicKind::Assign { lhs: *lhs, rhs: *rhs },
                    });
                }
                TokenFamily::AccessModifier => {
                    visit(tree, *lhs, role, table);
                    let old_stride = reshape_old_stride(tree, *lhs, token.ty);
                    table.insert(SymbolicObject {
                        node_idx: idx,
                        kind: SymbolicKind::AccessModifier { modifier: token.ty, child: *lhs, old_stride },
                    });
                }
                TokenFamily::Reduce | TokenFamily::ReduceRows | TokenFamily::ReduceColumns => {
                    visit(tree, *lhs, BufferRole::Bound, table);
                    if !tree.node(*rhs).is_invalid() {
                        visit(tree, *rhs, BufferRole::Bound, table);
                    }
                    let axis = match token.family {
                        TokenFamily::ReduceRows => Some(1),
                        TokenFamily::ReduceColumns => Some(0),
                        _ => None,
                    };
                    table.insert(SymbolicObject {
                        node_idx: idx,
                        kind: SymbolicKind::Reduction {
                            token: *token,
                            axis,
                            lhs: *lhs,
                            rhs: *rhs,
                            accumulator: format!("acc{idx}"),
                        },
                    });
                }
                TokenFamily::MatrixProduct => {
                    visit(tree, *lhs, BufferRole::Bound, table);
                    visit(tree, *rhs, BufferRole::Bound, table);
                    table.insert(SymbolicObject {
                        node_idx: idx,
                        kind: SymbolicKind::Operator { token: *token, lhs: *lhs, rhs: *rhs },
                    });
                }
                TokenFamily::UnaryArithmetic | TokenFamily::BinaryArithmetic => {
                    visit(tree, *lhs, role, table);
                    if !tree.node(*rhs).is_invalid() {
                        visit(tree, *rhs, role, table);
                    }
                    table.insert(SymbolicObject {
                        node_idx: idx,
                        kind: SymbolicKind::Operator { token: *token, lhs: *lhs, rhs: *rhs },
                    });
                }
            }
        }
    }
}

/// Access modifiers wrap a contiguous producer (the scheduler guarantees
/// reshape's operand is materialized first, §4.2 rule 3); recovering its
/// pre-reshape stride lets the generated `at` rewrite a new multi-index
/// back onto the flat offset the old layout used.
fn reshape_old_stride(tree: &Tree, child: usize, modifier: TokenType) -> Option<Stride> {
    if modifier != TokenType::Reshape {
        return None;
    }
    match tree.node(child) {
        Node::DenseArray { stride, .. } => Some(stride.clone()),
        _ => None,
    }
}

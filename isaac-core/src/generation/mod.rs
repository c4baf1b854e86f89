//! Code-generation templates (§4.3). Each template owns a fixed parameter
//! set, validates it (`is_invalid`), emits backend-agnostic kernel source
//! through the `$TOKEN` table of §9, and knows how to bind its own kernel
//! arguments in `enqueue`.
//!
//! Scoping note: `vwidth` is realized here as an unrolled run of scalar
//! lane stores rather than native vector load/store types — the driver
//! boundary that would carry a `float4`-equivalent type is out of scope
//! (§6), and unrolling preserves the per-lane read/write count the spec
//! describes without inventing a vector ABI. See `DESIGN.md`.

mod elementwise;
mod matrix_product;
mod reduce;
mod reduce2d;

pub use elementwise::{ElementWise1DParams, ElementWise2DParams};
pub use matrix_product::MatrixProductParams;
pub use reduce::Reduce1DParams;
pub use reduce2d::{Reduce2DAxis, Reduce2DParams};

use crate::driver::{Backend, CommandQueue, Event, Keyword, Program};
use crate::error::Result;
use crate::expression::{Node, Token, TokenType, Tree};
use crate::symbolic::{bound_stride_axes, SymbolicKind, SymbolicTable};
use isaac_types::NumericType;
use std::fmt;

/// How a kernel traverses its input (§4.3, profile encoding `0/1/2`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchPolicy {
    Local,
    GlobalStrided,
    GlobalContiguous,
}

impl FetchPolicy {
    pub fn from_profile_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FetchPolicy::Local),
            1 => Some(FetchPolicy::GlobalStrided),
            2 => Some(FetchPolicy::GlobalContiguous),
            _ => None,
        }
    }
}

/// Contract shared by every code-generation template (§4.3 preamble, §7
/// `code_generation_error`).
pub trait Template: fmt::Debug {
    /// `Some(reason)` if this parameter set violates a template constraint;
    /// `None` if it is eligible for dispatch.
    fn is_invalid(&self) -> Option<String>;

    /// Feature vector fed to the predictor (§4.6) and used to key the
    /// hardcoded-override map (§4.4 step 3).
    fn input_sizes(&self, tree: &Tree) -> Vec<i64>;

    fn lmem_usage(&self, dtype: NumericType) -> usize;

    fn registers_usage(&self) -> usize;

    /// Scratch elements this template needs from the context workspace,
    /// zero if it writes its result directly (§4.3.3, §4.3.4, §4.3.5).
    fn temporary_workspace(&self, tree: &Tree) -> usize;

    /// Emits kernel source under `kernel_name`, token-substituted for
    /// `backend`. May emit more than one `$KERNEL` (reductions, matrix
    /// products with `depth > 1`).
    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String>;

    /// Binds kernel arguments and enqueues every kernel this template
    /// compiled to, in program order.
    fn enqueue(
        &self,
        queue: &dyn CommandQueue,
        program: &dyn Program,
        kernel_name: &str,
        tree: &Tree,
        table: &SymbolicTable,
    ) -> Result<Vec<Box<dyn Event>>>;
}

/// Rewrites the `$TOKEN` placeholders of §9 for `backend`.
pub fn substitute_tokens(source: &str, backend: Backend) -> String {
    source
        .replace("$KERNEL", backend.keyword(Keyword::Kernel))
        .replace("$GLOBAL", backend.keyword(Keyword::Global))
        .replace("$LOCAL_IDX_0", backend.keyword(Keyword::LocalIdx0))
        .replace("$LOCAL_IDX_1", backend.keyword(Keyword::LocalIdx1))
        .replace("$GLOBAL_IDX_0", backend.keyword(Keyword::GlobalIdx0))
        .replace("$GLOBAL_IDX_1", backend.keyword(Keyword::GlobalIdx1))
        .replace("$GLOBAL_SIZE_0", backend.keyword(Keyword::GlobalSize0))
        .replace("$GLOBAL_SIZE_1", backend.keyword(Keyword::GlobalSize1))
        .replace("$GROUP_ID_0", backend.keyword(Keyword::GroupId0))
        .replace("$GROUP_ID_1", backend.keyword(Keyword::GroupId1))
        .replace("$LOCAL_BARRIER", backend.keyword(Keyword::LocalBarrier))
        .replace("$SIZE_T", backend.keyword(Keyword::SizeT))
        .replace("$MAD", backend.keyword(Keyword::Mad))
        .replace("$LOCAL", backend.keyword(Keyword::Local))
}

/// Recursively emits the C expression for `idx` under index expressions
/// `idxs`, delegating leaves and access modifiers to `SymbolicObject::at`
/// (§4.1) and combining operator nodes by their spelling (§4.1, §9).
pub fn emit_value(tree: &Tree, table: &SymbolicTable, idx: usize, idxs: &[&str]) -> String {
    let obj = table.get(idx);
    match &obj.kind {
        SymbolicKind::HostScalar { .. } => obj.host_value().expect("host scalar has a host value"),
        SymbolicKind::Buffer { .. } | SymbolicKind::AccessModifier { .. } => obj.at(table, idxs),
        SymbolicKind::Operator { token, lhs, rhs } => emit_operator(tree, table, *token, *lhs, *rhs, idxs),
        SymbolicKind::Reduction { accumulator, .. } => accumulator.clone(),
        SymbolicKind::Assign { .. } => unreachable!("assign node is not a value"),
    }
}

fn emit_operator(tree: &Tree, table: &SymbolicTable, token: Token, lhs: usize, rhs: usize, idxs: &[&str]) -> String {
    let l = emit_value(tree, table, lhs, idxs);
    if tree.node(rhs).is_invalid() {
        return match token.ty {
            TokenType::Negate => format!("(-{l})"),
            _ => format!("{}({l})", token.spelling()),
        };
    }
    let r = emit_value(tree, table, rhs, idxs);
    if token.is_infix_operator() {
        format!("({l} {} {r})", token.spelling())
    } else {
        format!("{}({l}, {r})", token.spelling())
    }
}

/// One buffer node's parameter declaration: pointer, start offset, then one
/// stride per axis `bound_stride_axes` reports (§4.3's enqueue order).
/// Shared by every template so a buffer's declaration and its binding in
/// `bind_buffer_arg` can never drift apart.
fn buffer_param_decl(name: &str, dtype: NumericType, shape_rank: usize, stride: &isaac_types::Stride) -> String {
    let mut parts = vec![format!("$GLOBAL {}* {name}", dtype.device_name()), format!("$SIZE_T {name}_start")];
    for axis in bound_stride_axes(stride, shape_rank) {
        parts.push(format!("$SIZE_T {name}_stride{axis}"));
    }
    parts.join(", ")
}

/// Declares every buffer node in `nodes`, in order, as kernel parameters.
pub fn buffer_params_decl(table: &SymbolicTable, nodes: impl IntoIterator<Item = usize>) -> String {
    nodes
        .into_iter()
        .filter_map(|idx| match &table.get(idx).kind {
            SymbolicKind::Buffer { name, dtype, shape, stride, .. } => {
                Some(buffer_param_decl(name, *dtype, shape.len(), stride))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Declares every host-scalar node in `table` as kernel parameters.
pub fn host_scalar_params_decl(table: &SymbolicTable) -> String {
    table
        .host_scalar_nodes
        .iter()
        .filter_map(|&idx| match &table.get(idx).kind {
            SymbolicKind::HostScalar { name, value } => Some(format!("{} {name}", value.dtype().device_name())),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Binds one buffer node's kernel arguments: pointer, start offset, then one
/// stride per axis `bound_stride_axes` reports, in the same order
/// `buffer_param_decl` declared them.
pub fn bind_buffer_arg(
    tree: &Tree,
    idx: usize,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    if let Node::DenseArray { buffer, start_offset, stride, shape, .. } = tree.node(idx) {
        kernel.set_buffer_arg(*next_index, buffer)?;
        *next_index += 1;
        kernel.set_size_arg(*next_index, *start_offset)?;
        *next_index += 1;
        for axis in bound_stride_axes(stride, shape.len()) {
            kernel.set_size_arg(*next_index, stride[axis])?;
            *next_index += 1;
        }
    }
    Ok(())
}

/// Binds every buffer node in `nodes`, in order.
pub fn bind_buffer_args(
    tree: &Tree,
    nodes: impl IntoIterator<Item = usize>,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    for idx in nodes {
        bind_buffer_arg(tree, idx, kernel, next_index)?;
    }
    Ok(())
}

/// Binds every host-scalar node in `table`, in order.
pub fn bind_host_scalar_args(
    table: &SymbolicTable,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    for &idx in &table.host_scalar_nodes {
        if let SymbolicKind::HostScalar { value, .. } = &table.get(idx).kind {
            kernel.set_scalar_arg_bytes(*next_index, &value.to_le_bytes())?;
            *next_index += 1;
        }
    }
    Ok(())
}

/// Finds the top-level `Assign`'s `(lhs, rhs)` node indices. Every
/// scheduled kernel tree is rooted at one (§4.2).
pub fn assign_parts(tree: &Tree) -> (usize, usize) {
    match tree.node(tree.root()) {
        crate::expression::Node::Composite { lhs, rhs, token, .. } if token.family == crate::expression::TokenFamily::Assign => {
            (*lhs, *rhs)
        }
        other => panic!("generation: tree root is not an assignment: {other:?}"),
    }
}

use super::{
    bind_buffer_args, bind_host_scalar_args, buffer_params_decl, host_scalar_params_decl, substitute_tokens, FetchPolicy,
    Template,
};
use crate::driver::{Backend, CommandQueue, Event, NDRange, Program};
use crate::error::{Error, Result};
use crate::expression::{Node, TokenFamily, TokenType, Tree};
use crate::symbolic::SymbolicTable;
use isaac_types::NumericType;

/// §4.3.5. A work-group owns an `mL x nL` output tile (`mL = mS*ls0`,
/// `nL = nS*ls1`); each work-item owns an `mS x nS` register tile and
/// accumulates over `K` in steps of `kL`, itself consumed in inner steps of
/// `kS` from a cooperatively-fetched local-memory tile of `A` and `B`.
///
/// Transpose is not a template parameter: which child of the matrix-product
/// node was wrapped in `trans` only changes the element-access expression
/// the symbolic layer produces (`SymbolicObject::at` already swaps indices
/// for a `trans` node), so the same generated kernel body serves all four
/// `Kind::MatrixProduct{NN,NT,TN,TT}` candidates.
#[derive(Clone, Debug)]
pub struct MatrixProductParams {
    pub vwidth: u32,
    pub ls0: u32,
    pub ls1: u32,
    pub kl: u32,
    pub depth: u32,
    pub ms: u32,
    pub ks: u32,
    pub ns: u32,
    pub a_fetch: FetchPolicy,
    pub b_fetch: FetchPolicy,
    pub lfetch0: u32,
    pub lfetch1: u32,
}

impl MatrixProductParams {
    pub fn ml(&self) -> u32 {
        self.ms * self.ls0
    }

    pub fn nl(&self) -> u32 {
        self.ns * self.ls1
    }

    fn lanes(&self) -> u32 {
        self.lfetch0 * self.lfetch1
    }
}

impl Template for MatrixProductParams {
    fn is_invalid(&self) -> Option<String> {
        if self.a_fetch != FetchPolicy::Local || self.b_fetch != FetchPolicy::Local {
            return Some("matrix product fetch policies must both be LOCAL".into());
        }
        if self.vwidth == 0 || self.ms % self.vwidth != 0 || self.ns % self.vwidth != 0 {
            return Some("mS and nS must be multiples of vwidth".into());
        }
        if self.ml() > 256 || self.nl() > 256 {
            return Some("mL and nL must not exceed 256".into());
        }
        if self.ks >= self.kl {
            return Some("kS must be strictly less than kL".into());
        }
        if self.lanes() != self.ls0 * self.ls1 {
            return Some("lfetch0 * lfetch1 must equal ls0 * ls1".into());
        }
        if (self.ml() * self.kl) % self.lanes() != 0 || (self.kl * self.nl()) % self.lanes() != 0 {
            return Some("local-fetch lanes must evenly tile the A and B local-memory tiles".into());
        }
        None
    }

    fn input_sizes(&self, tree: &Tree) -> Vec<i64> {
        let (m, n, k) = gemm_shape(tree);
        vec![m, n, k, self.ms as i64, self.ns as i64, self.ks as i64]
    }

    fn lmem_usage(&self, dtype: NumericType) -> usize {
        (self.ml() as usize * self.kl as usize + self.kl as usize * self.nl() as usize) * dtype.size_of()
    }

    fn registers_usage(&self) -> usize {
        self.ms as usize * self.ns as usize
    }

    fn temporary_workspace(&self, tree: &Tree) -> usize {
        if self.depth <= 1 {
            return 0;
        }
        let (m, n, _) = gemm_shape(tree);
        m as usize * n as usize * self.depth as usize
    }

    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String> {
        if let Some(reason) = self.is_invalid() {
            return Err(Error::CodeGenerationError(reason));
        }
        let gemm = decompose_gemm(tree);
        let a_elem = |row: &str, col: &str| table.get(gemm.a).at(table, &[row, col]);
        let b_elem = |row: &str, col: &str| table.get(gemm.b).at(table, &[row, col]);
        let bound_args = kernel_args_decl(table);
        let assignee_arg = assignee_decl(table);
        let alpha_expr = scalar_expr(table, gemm.alpha, "1");
        let beta_expr = scalar_expr(table, gemm.beta, "0");
        let c_store = |row: &str, col: &str| table.get(assign_lhs(tree)).at(table, &[row, col]);
        let c_read = gemm.c.map(|c| table.get(c).at(table, &["row", "col"]));

        // §4.3.5 "keep them as two separate code paths": the direct-write
        // store (depth == 1) and the workspace-plus-reduce store
        // (depth > 1) are distinct kernels rather than one kernel with a
        // runtime branch.
        if self.depth <= 1 {
            Ok(substitute_tokens(&self.generate_direct(kernel_name, &bound_args, &assignee_arg, &alpha_expr, &beta_expr, c_read.as_deref(), &c_store, &a_elem, &b_elem), backend))
        } else {
            let prod = self.generate_depth_prod(kernel_name, &bound_args, &alpha_expr, &a_elem, &b_elem);
            let reduce = self.generate_depth_reduce(kernel_name, &assignee_arg, &beta_expr, c_read.as_deref(), &c_store);
            Ok(substitute_tokens(&format!("{prod}\n{reduce}"), backend))
        }
    }

    fn enqueue(
        &self,
        queue: &dyn CommandQueue,
        program: &dyn Program,
        kernel_name: &str,
        tree: &Tree,
        table: &SymbolicTable,
    ) -> Result<Vec<Box<dyn Event>>> {
        let (m, n, k) = gemm_shape(tree);
        let name = if self.depth <= 1 { kernel_name.to_string() } else { format!("{kernel_name}_prod") };
        let mut kernel = program.kernel(&name)?;
        let mut idx = 0u32;
        kernel.set_size_arg(idx, m)?;
        idx += 1;
        kernel.set_size_arg(idx, n)?;
        idx += 1;
        kernel.set_size_arg(idx, k)?;
        idx += 1;
        if self.depth <= 1 {
            bind_assignee_args(tree, table, kernel.as_mut(), &mut idx)?;
        }
        bind_bound_args(tree, table, kernel.as_mut(), &mut idx)?;

        let groups0 = (m as f64 / self.ml() as f64).ceil() as usize;
        let groups1 = (n as f64 / self.nl() as f64).ceil() as usize;
        let global = NDRange::two_d(groups0 * self.ls0 as usize, groups1 * self.ls1 as usize * self.depth.max(1) as usize);
        let local = NDRange::two_d(self.ls0 as usize, self.ls1 as usize);

        if self.depth <= 1 {
            let event = queue.enqueue(kernel.as_ref(), global, local)?;
            return Ok(vec![event]);
        }

        let workspace = queue.context().workspace_buffer(m as usize * n as usize * self.depth as usize * NumericType::Float64.size_of())?;
        kernel.set_buffer_arg(idx, &workspace)?;
        let prod_event = queue.enqueue(kernel.as_ref(), global, local)?;

        let mut reduce = program.kernel(&format!("{kernel_name}_reduce"))?;
        let mut idx = 0u32;
        reduce.set_size_arg(idx, m)?;
        idx += 1;
        reduce.set_size_arg(idx, n)?;
        idx += 1;
        reduce.set_size_arg(idx, self.depth as i64)?;
        idx += 1;
        bind_assignee_args(tree, table, reduce.as_mut(), &mut idx)?;
        bind_bound_args(tree, table, reduce.as_mut(), &mut idx)?;
        reduce.set_buffer_arg(idx, &workspace)?;
        let reduce_global = NDRange::two_d(m as usize, n as usize);
        let reduce_local = NDRange::two_d(1, 1);
        let reduce_event = queue.enqueue(reduce.as_ref(), reduce_global, reduce_local)?;

        Ok(vec![prod_event, reduce_event])
    }
}

impl MatrixProductParams {
    /// Cooperative load of an `tile_rows x tile_cols` tile into local memory
    /// `dest`, `lanes()` work-items wide, with bounds-checked zero-padding
    /// for the trailing-K iteration (§4.3.5 step 1). `swap_rc` lays the
    /// flat lane index out column-major (used for B's `kL x nL` tile so
    /// adjacent lanes read adjacent `N` columns).
    fn fetch_loops(
        &self,
        dest: &str,
        rows_bound: &str,
        cols_bound: &str,
        tile_rows: u32,
        tile_cols: u32,
        elem: &dyn Fn(&str, &str) -> String,
        row0: &str,
        col0: &str,
        swap_rc: bool,
    ) -> String {
        let total = tile_rows as usize * tile_cols as usize;
        let lanes = self.lanes() as usize;
        let lead = if swap_rc { tile_cols } else { tile_rows };
        let (r, c) = if swap_rc { ("tc", "tr") } else { ("tr", "tc") };
        let value = elem("gr", "gc");
        format!(
            "  for ($SIZE_T t = lid; t < {total}; t += {lanes}) {{\n    \
             $SIZE_T tr = t % {lead}; $SIZE_T tc = t / {lead};\n    \
             $SIZE_T gr = {row0} + {r}; $SIZE_T gc = {col0} + {c};\n    \
             {dest}[t] = (gr < {rows_bound} && gc < {cols_bound}) ? {value} : 0;\n  \
             }}\n"
        )
    }

    fn generate_direct(
        &self,
        kernel_name: &str,
        bound_args: &str,
        assignee_arg: &str,
        alpha_expr: &str,
        beta_expr: &str,
        c_read: Option<&str>,
        c_store: &dyn Fn(&str, &str) -> String,
        a_elem: &dyn Fn(&str, &str) -> String,
        b_elem: &dyn Fn(&str, &str) -> String,
    ) -> String {
        let body = self.body(alpha_expr, beta_expr, c_read, c_store, a_elem, b_elem);
        format!(
            "$KERNEL void {kernel_name}($SIZE_T M, $SIZE_T N, $SIZE_T K, {assignee_arg}, {bound_args}) {{\n{body}}}\n"
        )
    }

    fn generate_depth_prod(
        &self,
        kernel_name: &str,
        bound_args: &str,
        alpha_expr: &str,
        a_elem: &dyn Fn(&str, &str) -> String,
        b_elem: &dyn Fn(&str, &str) -> String,
    ) -> String {
        let body = self.body(alpha_expr, "0", None, &|row: &str, col: &str| format!("workspace[(($SIZE_T){row}) * N * depth_slices + (($SIZE_T){col}) * depth_slices + depth_slice]"), a_elem, b_elem);
        format!(
            "$KERNEL void {kernel_name}_prod($SIZE_T M, $SIZE_T N, $SIZE_T K, {bound_args}, $GLOBAL double* workspace) {{\n  \
             $SIZE_T depth_slices = {depth};\n  $SIZE_T depth_slice = $GROUP_ID_1 % depth_slices;\n{body}}}\n",
            depth = self.depth,
        )
    }

    fn generate_depth_reduce(
        &self,
        kernel_name: &str,
        assignee_arg: &str,
        beta_expr: &str,
        c_read: Option<&str>,
        c_store: &dyn Fn(&str, &str) -> String,
    ) -> String {
        let beta_term = match c_read {
            Some(c) => format!(" + ({beta_expr}) * ({c})"),
            None => String::new(),
        };
        format!(
            "$KERNEL void {kernel_name}_reduce($SIZE_T M, $SIZE_T N, $SIZE_T depth, {assignee_arg}) {{\n  \
             for ($SIZE_T row = $GLOBAL_IDX_0; row < M; row += $GLOBAL_SIZE_0) {{\n    \
             for ($SIZE_T col = $GLOBAL_IDX_1; col < N; col += $GLOBAL_SIZE_1) {{\n      \
             double acc = 0;\n      \
             for ($SIZE_T d = 0; d < depth; d++) {{ acc += workspace[row * N * depth + col * depth + d]; }}\n      \
             {store} = acc{beta_term};\n    }}\n  }}\n}}\n",
            store = c_store("row", "col"),
        )
    }

    /// Shared register-tile K-loop: cooperative fetch of an `mL x kL` tile
    /// of A and a `kL x nL` tile of B into local memory, a barrier, then
    /// `mS x nS x kS` fused-multiply-adds per lane, repeated every `kL`
    /// until `K` is exhausted. `store` receives the post-loop, alpha/beta
    /// blended tile element so the direct-write and depth-split paths can
    /// each supply their own destination.
    fn body(
        &self,
        alpha_expr: &str,
        beta_expr: &str,
        c_read: Option<&str>,
        store: &dyn Fn(&str, &str) -> String,
        a_elem: &dyn Fn(&str, &str) -> String,
        b_elem: &dyn Fn(&str, &str) -> String,
    ) -> String {
        let ml = self.ml();
        let nl = self.nl();
        let kl = self.kl;
        let ms = self.ms;
        let ns = self.ns;
        let ks = self.ks;
        let a_fetch = self.fetch_loops("lmem_a", "M", "K", ml, kl, a_elem, "group_row", "k0", false);
        let b_fetch = self.fetch_loops("lmem_b", "K", "N", kl, nl, b_elem, "k0", "group_col", true);
        let beta_term = match c_read {
            Some(c) => format!(" + ({beta_expr}) * ({c})"),
            None => String::new(),
        };
        format!(
            "  $LOCAL double lmem_a[{ml}*{kl}];\n  $LOCAL double lmem_b[{kl}*{nl}];\n  \
             $SIZE_T group_row = $GROUP_ID_0 * {ml};\n  $SIZE_T group_col = $GROUP_ID_1 * {nl};\n  \
             $SIZE_T lid = $LOCAL_IDX_1 * {ls0} + $LOCAL_IDX_0;\n  \
             double acc[{ms}][{ns}];\n  \
             for (int mi = 0; mi < {ms}; mi++) for (int ni = 0; ni < {ns}; ni++) acc[mi][ni] = 0;\n  \
             for ($SIZE_T k0 = 0; k0 < K; k0 += {kl}) {{\n\
             {a_fetch}{b_fetch}    $LOCAL_BARRIER;\n    \
             for ($SIZE_T kk = 0; kk < {kl}; kk += {ks}) {{\n      \
             for (int ks_i = 0; ks_i < {ks}; ks_i++) {{\n        \
             if (kk + ks_i >= {kl}) break;\n        \
             for (int mi = 0; mi < {ms}; mi++) {{\n          \
             double av = lmem_a[(kk+ks_i) * {ml} + $LOCAL_IDX_0 * {ms} + mi];\n          \
             for (int ni = 0; ni < {ns}; ni++) {{\n            \
             double bv = lmem_b[(kk+ks_i) * {nl} + $LOCAL_IDX_1 * {ns} + ni];\n            \
             acc[mi][ni] = $MAD(av, bv, acc[mi][ni]);\n          }}\n        }}\n      }}\n    }}\n    \
             $LOCAL_BARRIER;\n  }}\n  \
             for (int mi = 0; mi < {ms}; mi++) {{\n    \
             $SIZE_T row = group_row + $LOCAL_IDX_0 * {ms} + mi;\n    \
             if (row >= M) continue;\n    \
             for (int ni = 0; ni < {ns}; ni++) {{\n      \
             $SIZE_T col = group_col + $LOCAL_IDX_1 * {ns} + ni;\n      \
             if (col >= N) continue;\n      \
             {store_call} = ({alpha_expr}) * acc[mi][ni]{beta_term};\n    }}\n  }}\n",
            ls0 = self.ls0,
            store_call = store("row", "col"),
        )
    }
}

fn gemm_shape(tree: &Tree) -> (i64, i64, i64) {
    let gemm = decompose_gemm(tree);
    let a_shape = tree.node(gemm.a).shape();
    let c_shape = tree.node(assign_lhs(tree)).shape();
    let m = c_shape.as_slice().first().copied().unwrap_or(1);
    let n = c_shape.as_slice().get(1).copied().unwrap_or(1);
    let k = a_shape.as_slice().get(1).copied().unwrap_or(a_shape.as_slice().first().copied().unwrap_or(1));
    (m, n, k)
}

fn assign_lhs(tree: &Tree) -> usize {
    match tree.node(tree.root()) {
        Node::Composite { lhs, token, .. } if token.family == TokenFamily::Assign => *lhs,
        other => panic!("matrix product: tree root is not an assignment: {other:?}"),
    }
}

struct Gemm {
    alpha: Option<usize>,
    a: usize,
    b: usize,
    beta: Option<usize>,
    c: Option<usize>,
}

fn is_matrix_product(tree: &Tree, idx: usize) -> Option<(usize, usize)> {
    match tree.node(idx) {
        Node::Composite { lhs, rhs, token, .. } if token.family == TokenFamily::MatrixProduct => Some((*lhs, *rhs)),
        _ => None,
    }
}

/// Peels an optional scalar multiplier off of `idx`, returning
/// `(scalar_node, matrix_product_node)` if `idx` is `alpha * (A@B)` (in
/// either operand order) or just `(A@B)` with an implicit `alpha = 1`.
fn peel_alpha(tree: &Tree, idx: usize) -> Option<(Option<usize>, usize)> {
    if is_matrix_product(tree, idx).is_some() {
        return Some((None, idx));
    }
    if let Node::Composite { lhs, rhs, token, .. } = tree.node(idx) {
        if token.family == TokenFamily::BinaryArithmetic && token.ty == TokenType::Mult {
            if is_matrix_product(tree, *rhs).is_some() && tree.node(*lhs).shape().product() == 1 {
                return Some((Some(*lhs), *rhs));
            }
            if is_matrix_product(tree, *lhs).is_some() && tree.node(*rhs).shape().product() == 1 {
                return Some((Some(*rhs), *lhs));
            }
        }
    }
    None
}

/// Decomposes the assignment's right-hand side into the canonical
/// `alpha * A @ B [+ beta * C]` form (§4.3.5). `C` defaults to the
/// assignee buffer itself when the rhs has no explicit additive term
/// (plain `C <- A@B` with an implicit `beta = 0`, so `C` is never read).
fn decompose_gemm(tree: &Tree) -> Gemm {
    let rhs = match tree.node(tree.root()) {
        Node::Composite { rhs, token, .. } if token.family == TokenFamily::Assign => *rhs,
        other => panic!("matrix product: tree root is not an assignment: {other:?}"),
    };

    if let Some((alpha, mm)) = peel_alpha(tree, rhs) {
        let (a, b) = is_matrix_product(tree, mm).expect("mm node");
        return Gemm { alpha, a, b, beta: None, c: None };
    }

    if let Node::Composite { lhs, rhs: rhs2, token, .. } = tree.node(rhs) {
        if token.family == TokenFamily::BinaryArithmetic && token.ty == TokenType::Add {
            if let Some((alpha, mm)) = peel_alpha(tree, *lhs) {
                let (a, b) = is_matrix_product(tree, mm).expect("mm node");
                let (beta, c) = peel_beta_c(tree, *rhs2);
                return Gemm { alpha, a, b, beta, c: Some(c) };
            }
            if let Some((alpha, mm)) = peel_alpha(tree, *rhs2) {
                let (a, b) = is_matrix_product(tree, mm).expect("mm node");
                let (beta, c) = peel_beta_c(tree, *lhs);
                return Gemm { alpha, a, b, beta, c: Some(c) };
            }
        }
    }

    panic!("matrix product: rhs is not of the form alpha*A@B [+ beta*C]")
}

fn peel_beta_c(tree: &Tree, idx: usize) -> (Option<usize>, usize) {
    if let Node::Composite { lhs, rhs, token, .. } = tree.node(idx) {
        if token.family == TokenFamily::BinaryArithmetic && token.ty == TokenType::Mult && tree.node(*lhs).shape().product() == 1 {
            return (Some(*lhs), *rhs);
        }
    }
    (None, idx)
}

fn scalar_expr(table: &SymbolicTable, scalar: Option<usize>, default_literal: &str) -> String {
    match scalar {
        Some(idx) => table.get(idx).host_value().unwrap_or_else(|| default_literal.to_string()),
        None => default_literal.to_string(),
    }
}

fn kernel_args_decl(table: &SymbolicTable) -> String {
    let buffers = buffer_params_decl(table, table.bound_buffer_nodes.iter().copied());
    let scalars = host_scalar_params_decl(table);
    [buffers, scalars].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(", ")
}

fn assignee_decl(table: &SymbolicTable) -> String {
    buffer_params_decl(table, table.assignee_buffer_nodes.iter().copied())
}

fn bind_assignee_args(
    tree: &Tree,
    table: &SymbolicTable,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    bind_buffer_args(tree, table.assignee_buffer_nodes.iter().copied(), kernel, next_index)
}

fn bind_bound_args(
    tree: &Tree,
    table: &SymbolicTable,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    bind_buffer_args(tree, table.bound_buffer_nodes.iter().copied(), kernel, next_index)?;
    bind_host_scalar_args(table, kernel, next_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, CommandQueue, Context, SimBackend};
    use crate::expression::Token;
    use isaac_types::{Shape, Stride};
    use std::sync::Arc;

    fn ctx() -> Arc<dyn Context> {
        SimBackend::new_queue(Backend::OpenClLike).0
    }

    fn dense(ctx: &Arc<dyn Context>, shape: Vec<i64>) -> Tree {
        let shape = Shape::new(shape);
        let stride = Stride::new(vec![1; shape.len()]);
        let bytes = (shape.product().max(1) as usize) * NumericType::Float32.size_of();
        let buffer = ctx.allocate(bytes).unwrap();
        Tree::leaf(
            Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset: 0, buffer },
            ctx.clone(),
        )
    }

    fn params(depth: u32) -> MatrixProductParams {
        MatrixProductParams {
            vwidth: 4,
            ls0: 16,
            ls1: 16,
            kl: 32,
            depth,
            ms: 4,
            ks: 8,
            ns: 4,
            a_fetch: FetchPolicy::Local,
            b_fetch: FetchPolicy::Local,
            lfetch0: 16,
            lfetch1: 16,
        }
    }

    #[test]
    fn builtin_profile_row_is_valid() {
        assert!(params(1).is_invalid().is_none());
    }

    #[test]
    fn rejects_non_local_fetch() {
        let p = MatrixProductParams { a_fetch: FetchPolicy::GlobalStrided, ..params(1) };
        assert!(p.is_invalid().is_some());
    }

    #[test]
    fn direct_assign_generates_single_kernel_with_alpha_one() {
        let ctx = ctx();
        let a = dense(&ctx, vec![32, 32]);
        let b = dense(&ctx, vec![32, 32]);
        let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();
        let c = dense(&ctx, vec![32, 32]);
        let assign = Tree::compose(&c, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();

        let table = crate::symbolic::annotate(&assign);
        let p = params(1);
        let source = p.generate("k0", &assign, &table, Backend::OpenClLike).unwrap();
        assert!(source.contains("__kernel void k0"));
        assert!(!source.contains("k0_prod"));
        assert_eq!(p.temporary_workspace(&assign), 0);
    }

    #[test]
    fn transposed_operand_reuses_same_kernel_body_shape() {
        let ctx = ctx();
        let a = dense(&ctx, vec![32, 32]);
        let a_t = Tree::unary(&a, Token::trans(), NumericType::Float32, Shape::new(vec![32, 32])).unwrap();
        let b = dense(&ctx, vec![32, 32]);
        let mm = Tree::compose(&a_t, Token::matrix_product(true, false), &b, NumericType::Float32, Shape::new(vec![32, 32]))
            .unwrap();
        let c = dense(&ctx, vec![32, 32]);
        let assign = Tree::compose(&c, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();

        let table = crate::symbolic::annotate(&assign);
        let source = params(1).generate("k0", &assign, &table, Backend::OpenClLike).unwrap();
        assert!(source.contains("__kernel void k0"));
    }

    #[test]
    fn depth_split_generates_prod_and_reduce_and_needs_workspace() {
        let ctx = ctx();
        let a = dense(&ctx, vec![32, 32]);
        let b = dense(&ctx, vec![32, 32]);
        let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();
        let c = dense(&ctx, vec![32, 32]);
        let assign = Tree::compose(&c, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();

        let table = crate::symbolic::annotate(&assign);
        let p = params(4);
        let source = p.generate("k0", &assign, &table, Backend::OpenClLike).unwrap();
        assert!(source.contains("k0_prod"));
        assert!(source.contains("k0_reduce"));
        assert_eq!(p.temporary_workspace(&assign), 32 * 32 * 4);
    }

    #[test]
    fn enqueue_direct_returns_one_event() {
        let ctx = ctx();
        let a = dense(&ctx, vec![32, 32]);
        let b = dense(&ctx, vec![32, 32]);
        let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();
        let c = dense(&ctx, vec![32, 32]);
        let assign = Tree::compose(&c, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![32, 32])).unwrap();

        let table = crate::symbolic::annotate(&assign);
        let p = params(1);
        let source = p.generate("k0", &assign, &table, Backend::OpenClLike).unwrap();
        let (_, queue) = SimBackend::new_queue(Backend::OpenClLike);
        let program = queue.compile(&source).unwrap();
        let events = p.enqueue(queue.as_ref(), program.as_ref(), "k0", &assign, &table).unwrap();
        assert_eq!(events.len(), 1);
    }
}

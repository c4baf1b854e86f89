use super::{assign_parts, bind_buffer_args, bind_host_scalar_args, buffer_params_decl, emit_value, host_scalar_params_decl, substitute_tokens, FetchPolicy, Template};
use crate::driver::{Backend, CommandQueue, Event, NDRange, Program};
use crate::error::{Error, Result};
use crate::expression::Tree;
use crate::symbolic::SymbolicTable;
use isaac_types::NumericType;

/// §4.3.1. `FETCH_LOCAL` is invalid for element-wise kernels.
#[derive(Clone, Debug)]
pub struct ElementWise1DParams {
    pub vwidth: u32,
    pub group_size: u32,
    pub num_groups: u32,
    pub fetch_policy: FetchPolicy,
}

impl Template for ElementWise1DParams {
    fn is_invalid(&self) -> Option<String> {
        if ![1, 2, 4].contains(&self.vwidth) {
            return Some(format!("vwidth must be 1, 2 or 4, got {}", self.vwidth));
        }
        if self.fetch_policy == FetchPolicy::Local {
            return Some("element-wise-1D cannot use FETCH_LOCAL".into());
        }
        if self.group_size == 0 || self.num_groups == 0 {
            return Some("group_size and num_groups must be positive".into());
        }
        None
    }

    fn input_sizes(&self, tree: &Tree) -> Vec<i64> {
        vec![tree.shape().product(), self.vwidth as i64, self.group_size as i64, self.num_groups as i64]
    }

    fn lmem_usage(&self, _dtype: NumericType) -> usize {
        0
    }

    fn registers_usage(&self) -> usize {
        self.vwidth as usize
    }

    fn temporary_workspace(&self, _tree: &Tree) -> usize {
        0
    }

    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String> {
        if let Some(reason) = self.is_invalid() {
            return Err(Error::CodeGenerationError(reason));
        }
        let (lhs, rhs) = assign_parts(tree);
        let mut body = String::new();
        for lane in 0..self.vwidth {
            let idx_expr = if lane == 0 { "i".to_string() } else { format!("(i+{lane})") };
            let value = emit_value(tree, table, rhs, &[&idx_expr]);
            let store = table.get(lhs).at(table, &[&idx_expr]);
            body.push_str(&format!("    if ({idx_expr}) < N {{ {store} = {value}; }}\n"));
        }
        let loop_body = match self.fetch_policy {
            FetchPolicy::GlobalStrided => format!(
                "  for ($SIZE_T i = $GLOBAL_IDX_0*{vw}; i < N; i += $GLOBAL_SIZE_0*{vw}) {{\n{body}  }}\n",
                vw = self.vwidth
            ),
            FetchPolicy::GlobalContiguous => format!(
                "  $SIZE_T chunk = (N + $GLOBAL_SIZE_0 - 1) / $GLOBAL_SIZE_0;\n  $SIZE_T start = $GLOBAL_IDX_0 * chunk;\n  $SIZE_T end = start + chunk < N ? start + chunk : N;\n  for ($SIZE_T i = start; i < end; i += {vw}) {{\n{body}  }}\n",
                vw = self.vwidth
            ),
            FetchPolicy::Local => unreachable!("rejected by is_invalid"),
        };
        let args = kernel_args(table);
        let source = format!("$KERNEL void {kernel_name}($SIZE_T N, {args}) {{\n{loop_body}}}\n");
        Ok(substitute_tokens(&source, backend))
    }

    fn enqueue(
        &self,
        queue: &dyn CommandQueue,
        program: &dyn Program,
        kernel_name: &str,
        tree: &Tree,
        table: &SymbolicTable,
    ) -> Result<Vec<Box<dyn Event>>> {
        let n = tree.shape().product();
        let mut kernel = program.kernel(kernel_name)?;
        let mut idx = 0u32;
        kernel.set_size_arg(idx, n)?;
        idx += 1;
        bind_value_args(tree, table, kernel.as_mut(), &mut idx)?;
        let global = NDRange::one_d((self.group_size * self.num_groups) as usize);
        let local = NDRange::one_d(self.group_size as usize);
        Ok(vec![queue.enqueue(kernel.as_ref(), global, local)?])
    }
}

/// §4.3.2: same structure as 1D, over two fetch-driven axes. `vwidth` must
/// be 1 and `fetch_policy` must not be `Local`.
#[derive(Clone, Debug)]
pub struct ElementWise2DParams {
    pub ls0: u32,
    pub ls1: u32,
    pub ng0: u32,
    pub ng1: u32,
    pub fetch_policy: FetchPolicy,
}

impl Template for ElementWise2DParams {
    fn is_invalid(&self) -> Option<String> {
        if self.fetch_policy == FetchPolicy::Local {
            return Some("element-wise-2D cannot use FETCH_LOCAL".into());
        }
        if [self.ls0, self.ls1, self.ng0, self.ng1].iter().any(|&v| v == 0) {
            return Some("local/group sizes must be positive".into());
        }
        None
    }

    fn input_sizes(&self, tree: &Tree) -> Vec<i64> {
        let shape = tree.shape();
        vec![
            shape.as_slice().first().copied().unwrap_or(1),
            shape.as_slice().get(1).copied().unwrap_or(1),
            self.ls0 as i64,
            self.ls1 as i64,
        ]
    }

    fn lmem_usage(&self, _dtype: NumericType) -> usize {
        0
    }

    fn registers_usage(&self) -> usize {
        1
    }

    fn temporary_workspace(&self, _tree: &Tree) -> usize {
        0
    }

    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String> {
        if let Some(reason) = self.is_invalid() {
            return Err(Error::CodeGenerationError(reason));
        }
        let (lhs, rhs) = assign_parts(tree);
        let value = emit_value(tree, table, rhs, &["i", "j"]);
        let store = table.get(lhs).at(table, &["i", "j"]);
        let body = format!("      {store} = {value};\n");
        let source = format!(
            "$KERNEL void {kernel_name}($SIZE_T M, $SIZE_T N, {args}) {{\n  for ($SIZE_T i = $GLOBAL_IDX_0; i < M; i += $GLOBAL_SIZE_0) {{\n    for ($SIZE_T j = $GLOBAL_IDX_1; j < N; j += $GLOBAL_SIZE_1) {{\n{body}    }}\n  }}\n}}\n",
            args = kernel_args(table)
        );
        Ok(substitute_tokens(&source, backend))
    }

    fn enqueue(
        &self,
        queue: &dyn CommandQueue,
        program: &dyn Program,
        kernel_name: &str,
        tree: &Tree,
        table: &SymbolicTable,
    ) -> Result<Vec<Box<dyn Event>>> {
        let shape = tree.shape();
        let m = shape.as_slice().first().copied().unwrap_or(1);
        let n = shape.as_slice().get(1).copied().unwrap_or(1);
        let mut kernel = program.kernel(kernel_name)?;
        let mut idx = 0u32;
        kernel.set_size_arg(idx, m)?;
        idx += 1;
        kernel.set_size_arg(idx, n)?;
        idx += 1;
        bind_value_args(tree, table, kernel.as_mut(), &mut idx)?;
        let global = NDRange::two_d((self.ls0 * self.ng0) as usize, (self.ls1 * self.ng1) as usize);
        let local = NDRange::two_d(self.ls0 as usize, self.ls1 as usize);
        Ok(vec![queue.enqueue(kernel.as_ref(), global, local)?])
    }
}

/// Parameter declarations for every distinct buffer (output first, then
/// bound inputs) followed by every host scalar, matching `bind_value_args`.
fn kernel_args(table: &SymbolicTable) -> String {
    let buffers = buffer_params_decl(table, table.assignee_buffer_nodes.iter().chain(table.bound_buffer_nodes.iter()).copied());
    let scalars = host_scalar_params_decl(table);
    [buffers, scalars].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(", ")
}

/// Binds every distinct buffer (assignee, then bound) and every host
/// scalar, in the same order `kernel_args` declared them.
fn bind_value_args(
    tree: &Tree,
    table: &SymbolicTable,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    bind_buffer_args(tree, table.assignee_buffer_nodes.iter().chain(table.bound_buffer_nodes.iter()).copied(), kernel, next_index)?;
    bind_host_scalar_args(table, kernel, next_index)
}

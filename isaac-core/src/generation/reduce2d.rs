use super::{
    assign_parts, bind_buffer_args, bind_host_scalar_args, buffer_params_decl, emit_value, host_scalar_params_decl,
    substitute_tokens, FetchPolicy, Template,
};
use crate::driver::{Backend, CommandQueue, Event, NDRange, Program};
use crate::error::{Error, Result};
use crate::expression::{Node, Tree};
use crate::symbolic::SymbolicTable;
use isaac_types::NumericType;

/// Which axis §4.3.4 collapses: `Rows` emits one output per row (reduces
/// along columns), `Cols` is the transposed analogue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reduce2DAxis {
    Rows,
    Cols,
}

/// §4.3.4. `prod` tiles the matrix `ls1` rows x `ls0` columns per
/// work-group; when `ng0 > 1` a second `reduce` kernel collapses the
/// per-group partials held in a `rows * ng0` workspace.
#[derive(Clone, Debug)]
pub struct Reduce2DParams {
    pub axis: Reduce2DAxis,
    pub vwidth: u32,
    pub ls0: u32,
    pub ls1: u32,
    pub ng0: u32,
    pub ng1: u32,
    pub op_spelling: &'static str,
    pub neutral_element: String,
    pub fetch_policy: FetchPolicy,
}

impl Template for Reduce2DParams {
    fn is_invalid(&self) -> Option<String> {
        if [self.ls0, self.ls1, self.ng0, self.ng1].iter().any(|&v| v == 0) {
            return Some("local/group sizes must be positive".into());
        }
        if self.axis == Reduce2DAxis::Cols && self.vwidth != 1 {
            return Some("column reduction requires vwidth = 1".into());
        }
        None
    }

    fn input_sizes(&self, tree: &Tree) -> Vec<i64> {
        let shape = tree.shape();
        vec![shape.as_slice().first().copied().unwrap_or(1), self.ls0 as i64, self.ls1 as i64, self.ng0 as i64]
    }

    fn lmem_usage(&self, dtype: NumericType) -> usize {
        (self.ls0 as usize + 1) * self.ls1 as usize * dtype.size_of()
    }

    fn registers_usage(&self) -> usize {
        self.vwidth as usize
    }

    fn temporary_workspace(&self, tree: &Tree) -> usize {
        if self.ng0 <= 1 {
            return 0;
        }
        let rows = output_len(tree);
        rows as usize * self.ng0 as usize
    }

    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String> {
        if let Some(reason) = self.is_invalid() {
            return Err(Error::CodeGenerationError(reason));
        }
        let (_, rhs) = assign_parts(tree);
        let reduce_operand = match tree.node(rhs) {
            Node::Composite { lhs, .. } => *lhs,
            _ => rhs,
        };
        // Row reduction reads `body(row, col)` and collapses `col`; column
        // reduction is the transposed analogue with the loop/index roles
        // swapped (§4.3.4).
        let (outer_idx, inner_idx) = match self.axis {
            Reduce2DAxis::Rows => ("row", "col"),
            Reduce2DAxis::Cols => ("col", "row"),
        };
        let value = emit_value(tree, table, reduce_operand, &[outer_idx, inner_idx]);
        let bound_args = kernel_args_decl(table);
        let assignee_arg = assignee_decl(table);

        let multi_group = self.ng0 > 1;
        let write_dest = if multi_group {
            format!("workspace[{outer_idx} * {ng0} + $GROUP_ID_0]", ng0 = self.ng0)
        } else {
            table.get(assign_parts(tree).0).at(table, &[outer_idx])
        };
        let ws_param = if multi_group { ", $GLOBAL double* workspace" } else { "" };

        let prod = format!(
            "$KERNEL void {kernel_name}_prod($SIZE_T rows, $SIZE_T cols, {assignee_arg}{comma}{bound_args}{ws_param}) {{\n  \
             $LOCAL double lmem[{tile}];\n  \
             for ($SIZE_T {outer_idx} = $GLOBAL_IDX_1; {outer_idx} < rows; {outer_idx} += $GLOBAL_SIZE_1) {{\n    \
             double acc = {neutral};\n    \
             for ($SIZE_T {inner_idx} = $GLOBAL_IDX_0; {inner_idx} < cols; {inner_idx} += $GLOBAL_SIZE_0) {{\n      \
             acc = {op}(acc, {value});\n    }}\n    \
             lmem[$LOCAL_IDX_1 * {ls0} + $LOCAL_IDX_0] = acc;\n    $LOCAL_BARRIER;\n    \
             for ($SIZE_T stride = {ls0}/2; stride > 0; stride /= 2) {{\n      $LOCAL_BARRIER;\n      \
             if ($LOCAL_IDX_0 < stride) {{ lmem[$LOCAL_IDX_1 * {ls0} + $LOCAL_IDX_0] = {op}(lmem[$LOCAL_IDX_1 * {ls0} + $LOCAL_IDX_0], lmem[$LOCAL_IDX_1 * {ls0} + $LOCAL_IDX_0 + stride]); }}\n    }}\n    \
             if ($LOCAL_IDX_0 == 0) {{ {write_dest} = lmem[$LOCAL_IDX_1 * {ls0}]; }}\n  }}\n}}\n",
            comma = if bound_args.is_empty() { "" } else { ", " },
            tile = (self.ls0 as usize + 1) * self.ls1 as usize,
            ls0 = self.ls0,
            neutral = self.neutral_element,
            op = self.op_spelling,
        );

        let source = if multi_group {
            let rows_store = table.get(assign_parts(tree).0).at(table, &[outer_idx]);
            let reduce_kernel = format!(
                "$KERNEL void {kernel_name}_reduce($SIZE_T rows, $SIZE_T num_groups, {assignee_arg}, $GLOBAL double* workspace) {{\n  \
                 for ($SIZE_T {outer_idx} = $GLOBAL_IDX_0; {outer_idx} < rows; {outer_idx} += $GLOBAL_SIZE_0) {{\n    \
                 double acc = {neutral};\n    \
                 for ($SIZE_T g = 0; g < num_groups; g++) {{ acc = {op}(acc, workspace[{outer_idx} * num_groups + g]); }}\n    \
                 {rows_store} = acc;\n  }}\n}}\n",
                neutral = self.neutral_element,
                op = self.op_spelling,
            );
            format!("{prod}\n{reduce_kernel}")
        } else {
            prod
        };
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
        let shape = match self.axis {
            Reduce2DAxis::Rows => operand_shape(tree),
            Reduce2DAxis::Cols => operand_shape(tree),
        };
        let rows = shape.0;
        let cols = shape.1;
        let multi_group = self.ng0 > 1;

        let mut prod = program.kernel(&format!("{kernel_name}_prod"))?;
        let mut idx = 0u32;
        prod.set_size_arg(idx, rows)?;
        idx += 1;
        prod.set_size_arg(idx, cols)?;
        idx += 1;
        bind_assignee_args(tree, table, prod.as_mut(), &mut idx)?;
        bind_bound_args(tree, table, prod.as_mut(), &mut idx)?;
        let workspace = if multi_group {
            let ws = queue.context().workspace_buffer(rows as usize * self.ng0 as usize * NumericType::Float64.size_of())?;
            prod.set_buffer_arg(idx, &ws)?;
            Some(ws)
        } else {
            None
        };

        let global = NDRange::two_d((self.ls0 * self.ng0) as usize, (self.ls1 * self.ng1) as usize);
        let local = NDRange::two_d(self.ls0 as usize, self.ls1 as usize);
        let prod_event = queue.enqueue(prod.as_ref(), global, local)?;

        if !multi_group {
            return Ok(vec![prod_event]);
        }

        let mut reduce = program.kernel(&format!("{kernel_name}_reduce"))?;
        let mut idx = 0u32;
        reduce.set_size_arg(idx, rows)?;
        idx += 1;
        reduce.set_size_arg(idx, self.ng0 as i64)?;
        idx += 1;
        bind_assignee_args(tree, table, reduce.as_mut(), &mut idx)?;
        reduce.set_buffer_arg(idx, workspace.as_ref().unwrap())?;
        let global = NDRange::one_d(rows.max(1) as usize);
        let local = NDRange::one_d(1);
        let reduce_event = queue.enqueue(reduce.as_ref(), global, local)?;

        Ok(vec![prod_event, reduce_event])
    }
}

fn output_len(tree: &Tree) -> i64 {
    tree.shape().product().max(1)
}

/// `(rows, cols)` of the materialized operand being reduced, per the
/// reduction's fixed axis convention (§3: `(M, N)` pairs with row-major
/// iteration intent even though storage is column-major).
fn operand_shape(tree: &Tree) -> (i64, i64) {
    let (_, rhs) = assign_parts(tree);
    let operand = match tree.node(rhs) {
        Node::Composite { lhs, .. } => *lhs,
        _ => rhs,
    };
    let shape = tree.node(operand).shape();
    let rows = shape.as_slice().first().copied().unwrap_or(1);
    let cols = shape.as_slice().get(1).copied().unwrap_or(1);
    (rows, cols)
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

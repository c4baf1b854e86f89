use super::{
    assign_parts, bind_buffer_args, bind_host_scalar_args, buffer_params_decl, emit_value, host_scalar_params_decl,
    substitute_tokens, FetchPolicy, Template,
};
use crate::driver::{Backend, CommandQueue, Event, NDRange, Program};
use crate::error::{Error, Result};
use crate::expression::{Node, Tree};
use crate::symbolic::SymbolicTable;
use isaac_types::NumericType;

/// §4.3.3. Two kernels in one program: `prod` partially reduces into a
/// per-group workspace slot, `reduce` collapses those into the scalar
/// assignee.
#[derive(Clone, Debug)]
pub struct Reduce1DParams {
    pub vwidth: u32,
    pub group_size: u32,
    pub num_groups: u32,
    pub fetch_policy: FetchPolicy,
    pub index_producing: bool,
    pub neutral_element: String,
    pub op_spelling: &'static str,
}

impl Reduce1DParams {
    fn value_workspace_bytes(&self) -> usize {
        self.num_groups as usize * NumericType::Float64.size_of()
    }

    fn index_workspace_bytes(&self) -> usize {
        self.num_groups as usize * std::mem::size_of::<i64>()
    }
}

impl Template for Reduce1DParams {
    fn is_invalid(&self) -> Option<String> {
        if self.fetch_policy == FetchPolicy::Local {
            return Some("1D reduction cannot use FETCH_LOCAL".into());
        }
        if self.group_size == 0 || self.num_groups == 0 {
            return Some("group_size and num_groups must be positive".into());
        }
        None
    }

    fn input_sizes(&self, tree: &Tree) -> Vec<i64> {
        vec![tree.shape().product(), self.vwidth as i64, self.group_size as i64, self.num_groups as i64]
    }

    fn lmem_usage(&self, dtype: NumericType) -> usize {
        let slots = if self.index_producing { 2 } else { 1 };
        self.group_size as usize * dtype.size_of() * slots
    }

    fn registers_usage(&self) -> usize {
        self.vwidth as usize
    }

    fn temporary_workspace(&self, tree: &Tree) -> usize {
        let _ = tree;
        if self.index_producing {
            self.num_groups as usize * 2
        } else {
            self.num_groups as usize
        }
    }

    fn generate(&self, kernel_name: &str, tree: &Tree, table: &SymbolicTable, backend: Backend) -> Result<String> {
        if let Some(reason) = self.is_invalid() {
            return Err(Error::CodeGenerationError(reason));
        }
        // Per-lane unrolling mirrors `ElementWise1DParams::generate` so
        // `vwidth` is realized the same way across every template
        // (generation/mod.rs's module doc).
        let (_, rhs) = assign_parts(tree);
        let reduce_operand = reduction_operand(tree, rhs);
        let bound_args = kernel_args_decl(table, self.index_producing);
        let assignee_arg = assignee_decl(table);

        let mut prod_body = String::new();
        for lane in 0..self.vwidth {
            let idx_expr = if lane == 0 { "i".to_string() } else { format!("(i+{lane})") };
            let value = emit_value(tree, table, reduce_operand, &[&idx_expr]);
            if self.index_producing {
                prod_body.push_str(&format!(
                    "    if (({idx_expr}) < N) {{ double v = {value}; if ({op}(v, acc_val) == v && v != acc_val) {{ acc_val = v; acc_idx = {idx_expr}; }} }}\n",
                    op = self.op_spelling,
                ));
            } else {
                prod_body.push_str(&format!(
                    "    if (({idx_expr}) < N) {{ acc_val = {op}(acc_val, {value}); }}\n",
                    op = self.op_spelling,
                ));
            }
        }

        let prod = format!(
            "$KERNEL void {kernel_name}_prod($SIZE_T N, {bound_args}) {{\n  \
             $LOCAL double lmem_val[{gs}];\n  {idx_lmem}\n  \
             double acc_val = {neutral};\n  {idx_decl}\n  \
             for ($SIZE_T i = $GLOBAL_IDX_0*{vw}; i < N; i += $GLOBAL_SIZE_0*{vw}) {{\n{prod_body}  }}\n  \
             lmem_val[$LOCAL_IDX_0] = acc_val;\n  {idx_store}\n  $LOCAL_BARRIER;\n  \
             for ($SIZE_T stride = {gs}/2; stride > 0; stride /= 2) {{\n    $LOCAL_BARRIER;\n    \
             if ($LOCAL_IDX_0 < stride) {{ lmem_val[$LOCAL_IDX_0] = {op}(lmem_val[$LOCAL_IDX_0], lmem_val[$LOCAL_IDX_0+stride]); {idx_merge} }}\n  }}\n  \
             if ($LOCAL_IDX_0 == 0) {{ workspace_val[$GROUP_ID_0] = lmem_val[0]; {idx_write} }}\n}}\n",
            bound_args = bound_args,
            gs = self.group_size,
            vw = self.vwidth,
            neutral = self.neutral_element,
            op = self.op_spelling,
            idx_lmem = if self.index_producing { format!("$LOCAL $SIZE_T lmem_idx[{}];", self.group_size) } else { String::new() },
            idx_decl = if self.index_producing { "$SIZE_T acc_idx = 0;".to_string() } else { String::new() },
            idx_store = if self.index_producing { "lmem_idx[$LOCAL_IDX_0] = acc_idx;".to_string() } else { String::new() },
            idx_merge = if self.index_producing {
                "if (lmem_val[$LOCAL_IDX_0+stride] == lmem_val[$LOCAL_IDX_0]) lmem_idx[$LOCAL_IDX_0] = lmem_idx[$LOCAL_IDX_0+stride];"
                    .to_string()
            } else {
                String::new()
            },
            idx_write = if self.index_producing { "workspace_idx[$GROUP_ID_0] = lmem_idx[0];".to_string() } else { String::new() },
            prod_body = prod_body,
        );

        let ws_params = if self.index_producing {
            "$GLOBAL double* workspace_val, $GLOBAL long* workspace_idx".to_string()
        } else {
            "$GLOBAL double* workspace_val".to_string()
        };
        let reduce_kernel = if self.index_producing {
            format!(
                "$KERNEL void {kernel_name}_reduce($SIZE_T num_groups, {assignee_arg}, {ws_params}) {{\n  \
                 $LOCAL double lmem_val[{gs}];\n  $LOCAL long lmem_idx[{gs}];\n  \
                 double v = $LOCAL_IDX_0 < num_groups ? workspace_val[$LOCAL_IDX_0] : {neutral};\n  \
                 long vi = $LOCAL_IDX_0 < num_groups ? workspace_idx[$LOCAL_IDX_0] : 0;\n  \
                 lmem_val[$LOCAL_IDX_0] = v;\n  lmem_idx[$LOCAL_IDX_0] = vi;\n  $LOCAL_BARRIER;\n  \
                 for ($SIZE_T stride = {gs}/2; stride > 0; stride /= 2) {{\n    $LOCAL_BARRIER;\n    \
                 if ($LOCAL_IDX_0 < stride) {{\n      if ({op}(lmem_val[$LOCAL_IDX_0], lmem_val[$LOCAL_IDX_0+stride]) == lmem_val[$LOCAL_IDX_0+stride] && lmem_val[$LOCAL_IDX_0+stride] != lmem_val[$LOCAL_IDX_0]) {{\n        lmem_val[$LOCAL_IDX_0] = lmem_val[$LOCAL_IDX_0+stride];\n        lmem_idx[$LOCAL_IDX_0] = lmem_idx[$LOCAL_IDX_0+stride];\n      }}\n    }}\n  }}\n  \
                 if ($LOCAL_IDX_0 == 0) {{ {store} = lmem_idx[0]; }}\n}}\n",
                assignee_arg = assignee_arg,
                ws_params = ws_params,
                gs = self.group_size,
                neutral = self.neutral_element,
                op = self.op_spelling,
                store = scalar_store(table, tree),
            )
        } else {
            format!(
                "$KERNEL void {kernel_name}_reduce($SIZE_T num_groups, {assignee_arg}, {ws_params}) {{\n  \
                 $LOCAL double lmem_val[{gs}];\n  \
                 double v = $LOCAL_IDX_0 < num_groups ? workspace_val[$LOCAL_IDX_0] : {neutral};\n  \
                 lmem_val[$LOCAL_IDX_0] = v;\n  $LOCAL_BARRIER;\n  \
                 for ($SIZE_T stride = {gs}/2; stride > 0; stride /= 2) {{\n    $LOCAL_BARRIER;\n    \
                 if ($LOCAL_IDX_0 < stride) {{ lmem_val[$LOCAL_IDX_0] = {op}(lmem_val[$LOCAL_IDX_0], lmem_val[$LOCAL_IDX_0+stride]); }}\n  }}\n  \
                 if ($LOCAL_IDX_0 == 0) {{ {store} = lmem_val[0]; }}\n}}\n",
                assignee_arg = assignee_arg,
                ws_params = ws_params,
                gs = self.group_size,
                neutral = self.neutral_element,
                op = self.op_spelling,
                store = scalar_store(table, tree),
            )
        };

        let source = format!("{prod}\n{reduce_kernel}");
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
        let value_ws = queue.context().workspace_buffer(self.value_workspace_bytes())?;
        let index_ws =
            if self.index_producing { Some(queue.context().workspace_buffer(self.index_workspace_bytes())?) } else { None };

        let mut prod = program.kernel(&format!("{kernel_name}_prod"))?;
        let mut idx = 0u32;
        prod.set_size_arg(idx, n)?;
        idx += 1;
        bind_bound_args(tree, table, prod.as_mut(), &mut idx)?;
        prod.set_buffer_arg(idx, &value_ws)?;
        idx += 1;
        if let Some(ws) = &index_ws {
            prod.set_buffer_arg(idx, ws)?;
        }

        let global = NDRange::one_d((self.group_size * self.num_groups) as usize);
        let local = NDRange::one_d(self.group_size as usize);
        let prod_event = queue.enqueue(prod.as_ref(), global, local)?;

        let mut reduce = program.kernel(&format!("{kernel_name}_reduce"))?;
        let mut idx = 0u32;
        reduce.set_size_arg(idx, self.num_groups as i64)?;
        idx += 1;
        bind_assignee_args(tree, table, reduce.as_mut(), &mut idx)?;
        reduce.set_buffer_arg(idx, &value_ws)?;
        idx += 1;
        if let Some(ws) = &index_ws {
            reduce.set_buffer_arg(idx, ws)?;
        }

        let global = NDRange::one_d(self.group_size as usize);
        let local = NDRange::one_d(self.group_size as usize);
        let reduce_event = queue.enqueue(reduce.as_ref(), global, local)?;

        Ok(vec![prod_event, reduce_event])
    }
}

/// The reduction node's reduced operand (materialized element-wise, §4.2
/// rule 2), read inside `prod`'s streaming loop.
fn reduction_operand(tree: &Tree, assign_rhs: usize) -> usize {
    match tree.node(assign_rhs) {
        Node::Composite { lhs, .. } => *lhs,
        _ => assign_rhs,
    }
}

fn kernel_args_decl(table: &SymbolicTable, index_producing: bool) -> String {
    let buffers = buffer_params_decl(table, table.bound_buffer_nodes.iter().copied());
    let scalars = host_scalar_params_decl(table);
    let mut parts: Vec<String> = [buffers, scalars].into_iter().filter(|s| !s.is_empty()).collect();
    parts.push("$GLOBAL double* workspace_val".into());
    if index_producing {
        parts.push("$GLOBAL long* workspace_idx".into());
    }
    parts.join(", ")
}

fn assignee_decl(table: &SymbolicTable) -> String {
    buffer_params_decl(table, table.assignee_buffer_nodes.iter().copied())
}

fn scalar_store(table: &SymbolicTable, tree: &Tree) -> String {
    let (lhs, _) = assign_parts(tree);
    table.get(lhs).at(table, &["0"])
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

fn bind_assignee_args(
    tree: &Tree,
    table: &SymbolicTable,
    kernel: &mut dyn crate::driver::Kernel,
    next_index: &mut u32,
) -> Result<()> {
    bind_buffer_args(tree, table.assignee_buffer_nodes.iter().copied(), kernel, next_index)
}

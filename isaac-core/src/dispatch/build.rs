//! Turns one profile row plus the tree being dispatched into a concrete
//! `Template` instance (§4.4, parameter ordering decided per `Kind` since
//! the profile format itself only specifies opaque integer columns).

use crate::driver::Backend;
use crate::error::{Error, Result};
use crate::expression::{Node, Token, TokenFamily, TokenType, Tree};
use crate::generation::{
    ElementWise1DParams, ElementWise2DParams, FetchPolicy, MatrixProductParams, Reduce1DParams, Reduce2DAxis,
    Reduce2DParams, Template,
};
use crate::schedule::Kind;
use isaac_types::NumericType;

pub fn build_template(
    kind: Kind,
    dtype: NumericType,
    row: &[i64],
    tree: &Tree,
    backend: Backend,
) -> Result<Box<dyn Template>> {
    let template: Box<dyn Template> = match kind {
        Kind::ElementWise1D => Box::new(ElementWise1DParams {
            vwidth: col(row, 0)? as u32,
            group_size: col(row, 1)? as u32,
            num_groups: col(row, 2)? as u32,
            fetch_policy: fetch(row, 3)?,
        }),
        Kind::ElementWise2D => Box::new(ElementWise2DParams {
            ls0: col(row, 0)? as u32,
            ls1: col(row, 1)? as u32,
            ng0: col(row, 2)? as u32,
            ng1: col(row, 3)? as u32,
            fetch_policy: fetch(row, 4)?,
        }),
        Kind::Reduce1D => {
            let reduce = find_reduce_token(tree)?;
            Box::new(Reduce1DParams {
                vwidth: col(row, 0)? as u32,
                group_size: col(row, 1)? as u32,
                num_groups: col(row, 2)? as u32,
                fetch_policy: fetch(row, 3)?,
                index_producing: reduce.is_index_producing_reduction(),
                neutral_element: reduce.neutral_element(dtype, &backend.infinity_spelling(dtype)),
                op_spelling: reduction_op_spelling(reduce.ty),
            })
        }
        Kind::Reduce2DRows | Kind::Reduce2DCols => {
            let reduce = find_reduce_token(tree)?;
            let axis = if kind == Kind::Reduce2DRows { Reduce2DAxis::Rows } else { Reduce2DAxis::Cols };
            Box::new(Reduce2DParams {
                axis,
                vwidth: col(row, 0)? as u32,
                ls0: col(row, 1)? as u32,
                ls1: col(row, 2)? as u32,
                ng0: col(row, 3)? as u32,
                ng1: col(row, 4)? as u32,
                op_spelling: reduction_op_spelling(reduce.ty),
                neutral_element: reduce.neutral_element(dtype, &backend.infinity_spelling(dtype)),
                fetch_policy: fetch(row, 5)?,
            })
        }
        Kind::MatrixProductNN | Kind::MatrixProductNT | Kind::MatrixProductTN | Kind::MatrixProductTT => {
            Box::new(MatrixProductParams {
                vwidth: col(row, 0)? as u32,
                ls0: col(row, 1)? as u32,
                kl: col(row, 2)? as u32,
                ls1: col(row, 3)? as u32,
                depth: col(row, 4)? as u32,
                ms: col(row, 5)? as u32,
                ks: col(row, 6)? as u32,
                ns: col(row, 7)? as u32,
                a_fetch: fetch(row, 8)?,
                b_fetch: fetch(row, 9)?,
                lfetch0: col(row, 10)? as u32,
                lfetch1: col(row, 11)? as u32,
            })
        }
    };

    if let Some(reason) = template.is_invalid() {
        return Err(Error::CodeGenerationError(format!("profile row {row:?} for {kind:?} is invalid: {reason}")));
    }
    Ok(template)
}

fn col(row: &[i64], idx: usize) -> Result<i64> {
    row.get(idx).copied().ok_or_else(|| Error::CodeGenerationError(format!("profile row {row:?} missing column {idx}")))
}

fn fetch(row: &[i64], idx: usize) -> Result<FetchPolicy> {
    let code = col(row, idx)?;
    FetchPolicy::from_profile_code(code)
        .ok_or_else(|| Error::CodeGenerationError(format!("profile row {row:?} has unknown fetch code {code} at column {idx}")))
}

/// Walks the scheduled kernel's tree for the reduction token driving it.
/// A `Reduce1D`/`Reduce2DRows`/`Reduce2DCols`-kind tree always has exactly
/// one: the scheduler only ever classifies a kernel this way because it
/// contains a reduce-family composite node.
fn find_reduce_token(tree: &Tree) -> Result<Token> {
    for node in tree.nodes() {
        if let Node::Composite { token, .. } = node {
            if matches!(token.family, TokenFamily::Reduce | TokenFamily::ReduceRows | TokenFamily::ReduceColumns) {
                return Ok(*token);
            }
        }
    }
    Err(Error::CodeGenerationError("reduce-kind kernel tree has no reduce-family node".into()))
}

/// C function-call spelling of a reduction operator (`acc = op(acc, val)`),
/// distinct from `Token::spelling`'s infix convention — reduce templates
/// always call `op_spelling` in function form. `Sum` has no libm function,
/// so compiled reduce sources get a small `isaac_sum` helper prepended
/// (see `REDUCE_HELPER_PREAMBLE`).
pub fn reduction_op_spelling(ty: TokenType) -> &'static str {
    match ty {
        TokenType::Sum => "isaac_sum",
        TokenType::Max | TokenType::FMax | TokenType::ArgMax | TokenType::ArgFMax => "fmax",
        TokenType::Min | TokenType::FMin | TokenType::ArgMin | TokenType::ArgFMin => "fmin",
        _ => "isaac_sum",
    }
}

/// Prepended once to any compiled source containing a `Sum` reduction.
pub const REDUCE_HELPER_PREAMBLE: &str = "static inline double isaac_sum(double a, double b) { return a + b; }\n";

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
        let bytes = (shape.product().max(1) as usize) * NumericType::Float32.size_of();
        let buffer = ctx.allocate(bytes).unwrap();
        Tree::leaf(Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset: 0, buffer }, ctx.clone())
    }

    #[test]
    fn reduction_op_spelling_maps_each_family_to_its_c_call() {
        assert_eq!(reduction_op_spelling(TokenType::Sum), "isaac_sum");
        assert_eq!(reduction_op_spelling(TokenType::Max), "fmax");
        assert_eq!(reduction_op_spelling(TokenType::FMax), "fmax");
        assert_eq!(reduction_op_spelling(TokenType::Min), "fmin");
        assert_eq!(reduction_op_spelling(TokenType::ArgFMin), "fmin");
    }

    #[test]
    fn build_template_rejects_a_short_row() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let err = build_template(Kind::ElementWise1D, NumericType::Float32, &[1, 64], &a, Backend::OpenClLike)
            .unwrap_err();
        assert!(matches!(err, Error::CodeGenerationError(_)));
    }

    #[test]
    fn build_template_rejects_an_unknown_fetch_code() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let err = build_template(Kind::ElementWise1D, NumericType::Float32, &[1, 64, 4, 9], &a, Backend::OpenClLike)
            .unwrap_err();
        assert!(matches!(err, Error::CodeGenerationError(_)));
    }

    #[test]
    fn build_template_builds_a_valid_elementwise_1d_candidate() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let template =
            build_template(Kind::ElementWise1D, NumericType::Float32, &[1, 64, 4, 1], &a, Backend::OpenClLike).unwrap();
        assert!(template.is_invalid().is_none());
    }

    #[test]
    fn build_template_derives_reduce_params_from_the_trees_reduce_token() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let reduced = Tree::unary(&a, Token::sum(None), NumericType::Float32, Shape::new(vec![1])).unwrap();
        let out = dense(&ctx, vec![1]);
        let assign = Tree::compose(&out, Token::assign(), &reduced, NumericType::Float32, Shape::new(vec![1])).unwrap();

        let template =
            build_template(Kind::Reduce1D, NumericType::Float32, &[1, 64, 4, 1], &assign, Backend::OpenClLike).unwrap();
        assert!(template.is_invalid().is_none());
    }

    #[test]
    fn build_template_errors_when_a_reduce_kind_tree_has_no_reduce_token() {
        let ctx = ctx();
        let a = dense(&ctx, vec![64]);
        let err =
            build_template(Kind::Reduce1D, NumericType::Float32, &[1, 64, 4, 1], &a, Backend::OpenClLike).unwrap_err();
        assert!(matches!(err, Error::CodeGenerationError(_)));
    }
}

use isaac_types::NumericType;

/// Which family of operator a token belongs to — determines how the
/// scheduler classifies the node (§4.2) and how the symbolic layer wraps it
/// (§4.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenFamily {
    UnaryArithmetic,
    BinaryArithmetic,
    Reduce,
    ReduceRows,
    ReduceColumns,
    MatrixProduct,
    /// `reshape`, `trans`, `diag_matrix`, `diag_vector` — index rewrites
    /// rather than computation.
    AccessModifier,
    Assign,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenType {
    Add,
    Sub,
    Mult,
    Div,

    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,

    Exp,
    Log,
    Sqrt,
    Abs,
    Pow,

    Negate,

    Sum,
    Max,
    Min,
    ArgMax,
    ArgMin,
    FMax,
    FMin,
    ArgFMax,
    ArgFMin,

    MatMatNN,
    MatMatNT,
    MatMatTN,
    MatMatTT,

    Reshape,
    Trans,
    DiagMatrix,
    DiagVector,

    Assign,

    Cast(NumericType),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub family: TokenFamily,
    pub ty: TokenType,
}

impl Token {
    pub fn new(family: TokenFamily, ty: TokenType) -> Self {
        Token { family, ty }
    }

    pub fn add() -> Self {
        Token::new(TokenFamily::BinaryArithmetic, TokenType::Add)
    }
    pub fn sub() -> Self {
        Token::new(TokenFamily::BinaryArithmetic, TokenType::Sub)
    }
    pub fn mult() -> Self {
        Token::new(TokenFamily::BinaryArithmetic, TokenType::Mult)
    }
    pub fn div() -> Self {
        Token::new(TokenFamily::BinaryArithmetic, TokenType::Div)
    }
    pub fn negate() -> Self {
        Token::new(TokenFamily::UnaryArithmetic, TokenType::Negate)
    }
    pub fn assign() -> Self {
        Token::new(TokenFamily::Assign, TokenType::Assign)
    }
    pub fn reshape() -> Self {
        Token::new(TokenFamily::AccessModifier, TokenType::Reshape)
    }
    pub fn trans() -> Self {
        Token::new(TokenFamily::AccessModifier, TokenType::Trans)
    }
    pub fn diag_matrix() -> Self {
        Token::new(TokenFamily::AccessModifier, TokenType::DiagMatrix)
    }
    pub fn diag_vector() -> Self {
        Token::new(TokenFamily::AccessModifier, TokenType::DiagVector)
    }
    pub fn sum(axis: Option<usize>) -> Self {
        let family = match axis {
            None => TokenFamily::Reduce,
            Some(0) => TokenFamily::ReduceColumns,
            Some(_) => TokenFamily::ReduceRows,
        };
        Token::new(family, TokenType::Sum)
    }
    pub fn matrix_product(a_trans: bool, b_trans: bool) -> Self {
        let ty = match (a_trans, b_trans) {
            (false, false) => TokenType::MatMatNN,
            (false, true) => TokenType::MatMatNT,
            (true, false) => TokenType::MatMatTN,
            (true, true) => TokenType::MatMatTT,
        };
        Token::new(TokenFamily::MatrixProduct, ty)
    }

    /// Whether this token spells as a C infix operator (`a OP b`) rather
    /// than a function call `fn(a, b)` — governs how the symbolic operator
    /// object's `evaluate` emits its expansion (§4.1).
    pub fn is_infix_operator(&self) -> bool {
        matches!(
            self.ty,
            TokenType::Add
                | TokenType::Sub
                | TokenType::Mult
                | TokenType::Div
                | TokenType::Less
                | TokenType::LessEqual
                | TokenType::Greater
                | TokenType::GreaterEqual
                | TokenType::Equal
                | TokenType::NotEqual
        )
    }

    pub fn is_index_producing_reduction(&self) -> bool {
        matches!(
            self.ty,
            TokenType::ArgMax | TokenType::ArgMin | TokenType::ArgFMax | TokenType::ArgFMin
        )
    }

    pub fn is_floating_neutral_reduction(&self) -> bool {
        matches!(
            self.ty,
            TokenType::FMax | TokenType::FMin | TokenType::ArgFMax | TokenType::ArgFMin
        )
    }

    /// C spelling of the operator/function for this token, used directly
    /// by the symbolic evaluator.
    pub fn spelling(&self) -> &'static str {
        match self.ty {
            TokenType::Add => "+",
            TokenType::Sub => "-",
            TokenType::Mult => "*",
            TokenType::Div => "/",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::Greater => ">",
            TokenType::GreaterEqual => ">=",
            TokenType::Equal => "==",
            TokenType::NotEqual => "!=",
            TokenType::Exp => "exp",
            TokenType::Log => "log",
            TokenType::Sqrt => "sqrt",
            TokenType::Abs => "fabs",
            TokenType::Pow => "pow",
            TokenType::Negate => "-",
            TokenType::Sum => "+",
            TokenType::FMax | TokenType::Max | TokenType::ArgMax | TokenType::ArgFMax => "max",
            TokenType::Min | TokenType::FMin | TokenType::ArgMin | TokenType::ArgFMin => "min",
            TokenType::Assign => "=",
            _ => "",
        }
    }

    /// Neutral element for a reduction operator, with device-appropriate
    /// spelling of infinity (§4.1).
    pub fn neutral_element(&self, dtype: NumericType, backend_infinity: &str) -> String {
        let inf = backend_infinity.to_string();
        let n_inf = format!("-{inf}");
        match self.ty {
            TokenType::Sum => "0".into(),
            TokenType::Max => n_inf,
            TokenType::Min => inf,
            TokenType::FMax | TokenType::ArgFMax | TokenType::ArgMax => n_inf,
            TokenType::FMin | TokenType::ArgFMin | TokenType::ArgMin => inf,
            _ => {
                let _ = dtype;
                "0".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_assign_the_expected_family() {
        assert_eq!(Token::add().family, TokenFamily::BinaryArithmetic);
        assert_eq!(Token::negate().family, TokenFamily::UnaryArithmetic);
        assert_eq!(Token::assign().family, TokenFamily::Assign);
        assert_eq!(Token::reshape().family, TokenFamily::AccessModifier);
        assert_eq!(Token::trans().family, TokenFamily::AccessModifier);
        assert_eq!(Token::diag_matrix().family, TokenFamily::AccessModifier);
        assert_eq!(Token::diag_vector().family, TokenFamily::AccessModifier);
    }

    #[test]
    fn sum_picks_family_by_axis() {
        assert_eq!(Token::sum(None).family, TokenFamily::Reduce);
        assert_eq!(Token::sum(Some(0)).family, TokenFamily::ReduceColumns);
        assert_eq!(Token::sum(Some(1)).family, TokenFamily::ReduceRows);
    }

    #[test]
    fn matrix_product_selects_type_by_transpose_flags() {
        assert_eq!(Token::matrix_product(false, false).ty, TokenType::MatMatNN);
        assert_eq!(Token::matrix_product(false, true).ty, TokenType::MatMatNT);
        assert_eq!(Token::matrix_product(true, false).ty, TokenType::MatMatTN);
        assert_eq!(Token::matrix_product(true, true).ty, TokenType::MatMatTT);
        assert_eq!(Token::matrix_product(false, false).family, TokenFamily::MatrixProduct);
    }

    #[test]
    fn is_infix_operator_covers_arithmetic_and_comparisons_only() {
        assert!(Token::add().is_infix_operator());
        assert!(Token::new(TokenFamily::BinaryArithmetic, TokenType::Less).is_infix_operator());
        assert!(!Token::new(TokenFamily::UnaryArithmetic, TokenType::Exp).is_infix_operator());
        assert!(!Token::sum(None).is_infix_operator());
    }

    #[test]
    fn is_index_producing_reduction_covers_only_the_arg_variants() {
        assert!(Token::new(TokenFamily::Reduce, TokenType::ArgMax).is_index_producing_reduction());
        assert!(Token::new(TokenFamily::Reduce, TokenType::ArgFMin).is_index_producing_reduction());
        assert!(!Token::new(TokenFamily::Reduce, TokenType::Max).is_index_producing_reduction());
        assert!(!Token::sum(None).is_index_producing_reduction());
    }

    #[test]
    fn is_floating_neutral_reduction_covers_the_f_and_arg_f_variants() {
        assert!(Token::new(TokenFamily::Reduce, TokenType::FMax).is_floating_neutral_reduction());
        assert!(Token::new(TokenFamily::Reduce, TokenType::ArgFMin).is_floating_neutral_reduction());
        assert!(!Token::new(TokenFamily::Reduce, TokenType::Max).is_floating_neutral_reduction());
    }

    #[test]
    fn spelling_matches_c_operator_or_function_names() {
        assert_eq!(Token::add().spelling(), "+");
        assert_eq!(Token::new(TokenFamily::UnaryArithmetic, TokenType::Sqrt).spelling(), "sqrt");
        assert_eq!(Token::new(TokenFamily::UnaryArithmetic, TokenType::Abs).spelling(), "fabs");
        assert_eq!(Token::assign().spelling(), "=");
        assert_eq!(Token::new(TokenFamily::MatrixProduct, TokenType::MatMatNN).spelling(), "");
    }

    #[test]
    fn neutral_element_uses_backend_infinity_for_max_and_min() {
        assert_eq!(Token::sum(None).neutral_element(NumericType::Float32, "INFINITY"), "0");
        assert_eq!(
            Token::new(TokenFamily::Reduce, TokenType::Max).neutral_element(NumericType::Float32, "INFINITY"),
            "-INFINITY"
        );
        assert_eq!(
            Token::new(TokenFamily::Reduce, TokenType::Min).neutral_element(NumericType::Float32, "INFINITY"),
            "INFINITY"
        );
        assert_eq!(
            Token::new(TokenFamily::Reduce, TokenType::ArgFMax).neutral_element(NumericType::Float32, "INFINITY"),
            "-INFINITY"
        );
    }
}

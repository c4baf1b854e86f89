//! Numeric-type enumeration, scalar union, and the `Tuple` shape/stride
//! primitive shared by every layer of the engine. Kept dependency-light and
//! `no_std`-free so the driver collaborator and the core can both depend on
//! it without pulling in code generation machinery.

mod numeric;
mod scalar;
mod tuple;

pub use numeric::NumericType;
pub use scalar::{Scalar, ScalarValue};
pub use tuple::{Shape, Stride, Tuple};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("dtype mismatch: {lhs} vs {rhs}")]
    DtypeMismatch { lhs: NumericType, rhs: NumericType },
}

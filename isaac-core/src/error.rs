/// The error taxonomy of spec.md §7. Kept as a hand-written enum (no
/// `thiserror`) matching the style of the teacher's `base::Error` — a flat
/// set of variants that callers match on, with `Display` written by hand so
/// the message can reference the offending values directly.
#[derive(Debug)]
pub enum Error {
    /// An internal call received an out-of-range dtype enum.
    UnknownDatatype(String),
    /// No dispatch entry for `(kind, dtype)`, or an unsupported operator tree.
    OperationNotSupported(String),
    /// The expression violates shape/dtype invariants.
    SemanticError(String),
    /// A template's `generate` raised an invariant beyond what `is_invalid` caught.
    CodeGenerationError(String),
    /// Would-exceed-workspace or other post-dispatch failure.
    RuntimeError(String),
    /// A typed error surfaced by the driver boundary.
    Driver(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownDatatype(m) => write!(f, "unknown datatype: {m}"),
            Error::OperationNotSupported(m) => write!(f, "operation not supported: {m}"),
            Error::SemanticError(m) => write!(f, "semantic error: {m}"),
            Error::CodeGenerationError(m) => write!(f, "code generation error: {m}"),
            Error::RuntimeError(m) => write!(f, "runtime error: {m}"),
            Error::Driver(m) => write!(f, "driver error: {m}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<isaac_types::TypesError> for Error {
    fn from(e: isaac_types::TypesError) -> Self {
        Error::SemanticError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

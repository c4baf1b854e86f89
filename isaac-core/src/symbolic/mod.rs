//! The symbolic annotation layer (§3, §4.1): wraps each expression node in
//! a typed object carrying a name, the attributes code generation needs,
//! and (for buffers/access modifiers) the index-access rule the spec calls
//! a named "lambda". See `object.rs` for why these are typed methods rather
//! than a generic string-template interpreter.

mod annotate;
mod binder;
mod object;
mod table;

pub use annotate::annotate;
pub use binder::{Binder, BufferRole};
pub use object::{bound_stride_axes, SymbolicKind, SymbolicObject};
pub use table::SymbolicTable;

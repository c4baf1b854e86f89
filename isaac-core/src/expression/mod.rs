//! The expression tree IR (§3, §4.1): a flat arena of nodes with
//! integer-indexed edges, plus the overloaded composers and the two
//! traversal primitives.

mod node;
mod tree;
mod token;

pub use node::{BufferId, Node};
pub use token::{Token, TokenFamily, TokenType};
pub use tree::Tree;

use crate::expression::{Node, Token, TokenFamily, TokenType, Tree};
use std::collections::HashMap;
use std::sync::Arc;

/// Structural hash of a tree (§4.5). Two trees hash identically iff they
/// have the same shape, dtype-per-leaf, and operator sequence — independent
/// of which concrete buffer objects back each `DenseArray` leaf, as long as
/// distinct leaves keep their relative buffer identity (invariant 3, §8).
pub fn hash_tree(tree: &Tree) -> String {
    let mut ids: HashMap<usize, u64> = HashMap::new();
    let mut next_id = 0u64;
    let mut out = String::new();
    let order = tree.dfs_postorder(tree.root(), |_, _| true);
    for idx in order {
        match tree.node(idx) {
            Node::Invalid | Node::ValueScalar { .. } => {}
            Node::DenseArray { dtype, shape, stride, buffer, .. } => {
                for axis in 0..shape.len() {
                    out.push(if shape[axis] > 1 { 'n' } else { '1' });
                }
                if !stride.is_empty() && stride[0] > 1 {
                    out.push('s');
                }
                out.push(dtype_char(*dtype));
                let key = Arc::as_ptr(buffer) as *const u8 as usize;
                let id = *ids.entry(key).or_insert_with(|| {
                    let id = next_id;
                    next_id += 1;
                    id
                });
                out.push_str(&id.to_string());
            }
            Node::Composite { token, .. } => {
                out.push(family_char(token.family));
                out.push_str(type_code(token.ty).as_str());
            }
        }
    }
    out
}

fn dtype_char(dtype: isaac_types::NumericType) -> char {
    use isaac_types::NumericType::*;
    match dtype {
        Invalid => '?',
        Int8 => 'c',
        UInt8 => 'C',
        Int16 => 's',
        UInt16 => 'S',
        Int32 => 'i',
        UInt32 => 'I',
        Int64 => 'l',
        UInt64 => 'L',
        Float32 => 'f',
        Float64 => 'd',
    }
}

fn family_char(family: TokenFamily) -> char {
    match family {
        TokenFamily::UnaryArithmetic => 'u',
        TokenFamily::BinaryArithmetic => 'b',
        TokenFamily::Reduce => 'r',
        TokenFamily::ReduceRows => 'R',
        TokenFamily::ReduceColumns => 'k',
        TokenFamily::MatrixProduct => 'm',
        TokenFamily::AccessModifier => 'a',
        TokenFamily::Assign => '=',
    }
}

fn type_code(ty: TokenType) -> String {
    match ty {
        TokenType::Cast(dt) => format!("X{}", dtype_char(dt)),
        other => (type_index(other)).to_string(),
    }
}

fn type_index(ty: TokenType) -> u32 {
    match ty {
        TokenType::Add => 0,
        TokenType::Sub => 1,
        TokenType::Mult => 2,
        TokenType::Div => 3,
        TokenType::Less => 4,
        TokenType::LessEqual => 5,
        TokenType::Greater => 6,
        TokenType::GreaterEqual => 7,
        TokenType::Equal => 8,
        TokenType::NotEqual => 9,
        TokenType::Exp => 10,
        TokenType::Log => 11,
        TokenType::Sqrt => 12,
        TokenType::Abs => 13,
        TokenType::Pow => 14,
        TokenType::Negate => 15,
        TokenType::Sum => 16,
        TokenType::Max => 17,
        TokenType::Min => 18,
        TokenType::ArgMax => 19,
        TokenType::ArgMin => 20,
        TokenType::FMax => 21,
        TokenType::FMin => 22,
        TokenType::ArgFMax => 23,
        TokenType::ArgFMin => 24,
        TokenType::MatMatNN => 25,
        TokenType::MatMatNT => 26,
        TokenType::MatMatTN => 27,
        TokenType::MatMatTT => 28,
        TokenType::Reshape => 29,
        TokenType::Trans => 30,
        TokenType::DiagMatrix => 31,
        TokenType::DiagVector => 32,
        TokenType::Assign => 33,
        TokenType::Cast(_) => 34,
    }
}

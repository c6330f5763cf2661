//! Constant pool entries.

use core_types::{SymbolId, Value};
use serde::{Deserialize, Serialize};

/// A constant as written by the compiler.
///
/// Strings are interned into the chunk's string buffer when the constant is
/// added, and surface at run time as static string values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    /// `none`
    None,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Integer(i64),
    /// Float literal
    Float(f64),
    /// String literal
    String(String),
    /// Symbol literal, index into the chunk symbol table
    Symbol(SymbolId),
    /// Error literal, index into the chunk symbol table
    Error(SymbolId),
    /// Enum member
    Enum {
        /// Index into the chunk enum table
        enum_id: u32,
        /// Member index
        member: u32,
    },
}

impl Const {
    /// Immediate value for non-string constants
    pub fn to_immediate(&self) -> Option<Value> {
        Some(match self {
            Const::None => Value::None,
            Const::Bool(b) => Value::Bool(*b),
            Const::Integer(n) => Value::Integer(*n),
            Const::Float(f) => Value::Float(*f),
            Const::Symbol(s) => Value::Symbol(*s),
            Const::Error(s) => Value::Error(*s),
            Const::Enum { enum_id, member } => Value::Enum {
                enum_id: *enum_id,
                member: *member,
            },
            Const::String(_) => return None,
        })
    }
}

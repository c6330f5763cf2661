//! Resolved symbol tables handed over by the compiler.
//!
//! Ids used by instructions are indices into these tables, except user type
//! ids which start at [`FIRST_USER_TYPE_ID`].

use core_types::{SemaTypeId, TypeId, FIRST_USER_TYPE_ID, SEMA_TYPE_ANY, SEMA_TYPE_DYNAMIC};
use serde::{Deserialize, Serialize};

use crate::opcode::Pc;

/// Function signature: parameter sema types and return sema type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncSig {
    /// Parameter types, receiver first for methods
    pub params: Vec<SemaTypeId>,
    /// Return type
    #[serde(default)]
    pub ret: SemaTypeId,
}

impl FuncSig {
    /// Signature accepting `n` arguments of any type
    pub fn untyped(n: usize) -> Self {
        Self {
            params: vec![SEMA_TYPE_ANY; n],
            ret: SEMA_TYPE_ANY,
        }
    }

    /// Whether any parameter needs a run-time type check
    pub fn is_typed(&self) -> bool {
        self.params
            .iter()
            .any(|p| *p != SEMA_TYPE_ANY && *p != SEMA_TYPE_DYNAMIC)
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A bytecode function body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    /// Name used in stack traces
    pub name: String,
    /// Entry instruction
    pub pc: Pc,
    /// Declared parameter count
    pub num_params: u8,
    /// Frame size in locals, return slot included
    pub stack_size: u8,
    /// Signature id
    #[serde(default)]
    pub sig: u32,
}

/// What a function symbol or method is bound to at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuncEntry {
    /// Bytecode function, index into the function table
    Func(u32),
    /// Host function looked up by name in the native registry
    Native {
        /// Registry name
        name: String,
        /// Signature id
        sig: u32,
    },
}

/// A named function symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncSymDecl {
    /// Symbol name
    pub name: String,
    /// Initial binding
    pub entry: FuncEntry,
}

/// Field of a user type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Declared sema type
    #[serde(default)]
    pub sema: SemaTypeId,
}

/// A user object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Type name
    pub name: String,
    /// Fields in storage order
    pub fields: Vec<FieldDecl>,
}

/// A method bound to a receiver type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Receiver runtime type
    pub type_id: TypeId,
    /// Method name, interned in the method name table
    pub name: String,
    /// Implementation
    pub entry: FuncEntry,
}

/// An enum and its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Enum name
    pub name: String,
    /// Member names
    pub members: Vec<String>,
}

/// A static variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticVarDecl {
    /// Variable name
    pub name: String,
    /// Constant pool index of the initial value, `none` if absent
    #[serde(default)]
    pub init: Option<u32>,
}

/// Runtime type id of the user type at `index` in the type table
pub fn user_type_id(index: usize) -> TypeId {
    FIRST_USER_TYPE_ID + index as TypeId
}

/// Index into the type table of a user type id
pub fn user_type_index(type_id: TypeId) -> Option<usize> {
    type_id
        .checked_sub(FIRST_USER_TYPE_ID)
        .map(|idx| idx as usize)
}

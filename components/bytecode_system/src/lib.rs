//! Bytecode format consumed by the interpreter.
//!
//! This crate defines the instruction set, the constant pool, the resolved
//! symbol tables and the [`BytecodeChunk`] container the compiler emits. A
//! chunk can be built programmatically or loaded from JSON.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode};
//!
//! let mut chunk = BytecodeChunk::new();
//! chunk.main_stack_size = 4;
//! chunk.emit(Opcode::ConstI8 { val: 2, dst: 1 });
//! chunk.emit(Opcode::ConstI8 { val: 3, dst: 2 });
//! chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 3 });
//! chunk.emit(Opcode::End);
//!
//! let json = chunk.to_json().unwrap();
//! let restored = BytecodeChunk::from_json(&json).unwrap();
//! assert_eq!(restored.instructions, chunk.instructions);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod constant;
pub mod debug;
pub mod error;
pub mod opcode;
pub mod tables;

pub use chunk::BytecodeChunk;
pub use constant::Const;
pub use debug::{DebugSym, DebugTable};
pub use error::ChunkError;
pub use opcode::{Local, MatchCase, OpKind, Opcode, Pc, NULL_LOCAL, NUM_CODES};
pub use tables::{
    user_type_id, user_type_index, EnumDecl, FieldDecl, FuncDecl, FuncEntry, FuncSig,
    FuncSymDecl, MethodDecl, StaticVarDecl, TypeDecl,
};

//! Bytecode interpreter for the scripting VM
//!
//! This crate provides the execution engine:
//! - A register-window dispatch loop over [`bytecode_system::Opcode`]
//! - Function calls, closures, method dispatch and native calls
//! - Inline caches for calls and field access, invalidated by a generation stamp
//! - Fibers (stackful coroutines) with yield and resume
//! - Try/catch unwinding that releases owned locals on the way out
//! - Panic payloads with symbolized stack traces
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode};
//! use core_types::{ResultCode, Value};
//! use interpreter::Vm;
//!
//! let mut chunk = BytecodeChunk::new();
//! chunk.main_stack_size = 3;
//! chunk.emit(Opcode::ConstI8 { val: 20, dst: 1 });
//! chunk.emit(Opcode::ConstI8 { val: 22, dst: 2 });
//! chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 1 });
//! chunk.emit(Opcode::End);
//!
//! let mut vm = Vm::default();
//! assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
//! assert_eq!(vm.local(1), Value::Integer(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod access;
mod call;
mod compare;
pub mod config;
mod dispatch;
pub mod error;
mod fiber;
mod host;
pub mod inline_cache;
pub mod natives;
pub mod symbols;
pub mod trace;
mod unwind;
pub mod vm;

// Re-export main types at crate root
pub use config::{EvalConfig, VmConfig};
pub use error::{Interrupt, PanicPayload, VmError};
pub use inline_cache::{CacheCell, FieldSlot, InlineCache, InlineCaches};
pub use natives::{NativeEntry, NativeFn, NativeRegistry};
pub use symbols::{FuncBinding, FuncSymbol, FuncTarget, RuntimeErrors, Symbols};
pub use trace::Trace;
pub use vm::Vm;

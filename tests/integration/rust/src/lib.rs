//! Integration test suite for the Corten bytecode VM
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

use bytecode_system::{BytecodeChunk, FuncDecl, FuncEntry, FuncSig};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use vm_cli;
}

/// Declare an untyped bytecode function and its symbol. Returns
/// `(function id, symbol id)`.
pub fn declare_func(chunk: &mut BytecodeChunk, name: &str, pc: u32, num_params: u8, stack_size: u8) -> (u32, u32) {
    let sig = chunk.add_sig(FuncSig::untyped(num_params as usize));
    let id = chunk.add_func(FuncDecl {
        name: name.to_string(),
        pc,
        num_params,
        stack_size,
        sig,
    });
    (id, chunk.add_func_sym(name, FuncEntry::Func(id)))
}

/// Declare a native function symbol of `arity` untyped parameters
pub fn declare_native(chunk: &mut BytecodeChunk, name: &str, arity: usize) -> u32 {
    let sig = chunk.add_sig(FuncSig::untyped(arity));
    chunk.add_func_sym(
        name,
        FuncEntry::Native {
            name: name.to_string(),
            sig,
        },
    )
}

//! Error types for the interpreter.
//!
//! [`Interrupt`] is the internal control signal every opcode helper returns;
//! `?` carries it to the dispatch loop, which resolves throws through try
//! frames and turns everything else into a terminal result code.
//! [`VmError`] is what host-facing helpers return.

use bytecode_system::ChunkError;
use core_types::{Panic, PanicType, StackFrame, TypeId, Value};
use memory_manager::HeapError;

/// Non-local exit from an opcode
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    /// Catchable thrown value
    Throw(Value),
    /// Unrecoverable error
    Panic(Panic),
    /// A frame push would exceed the stack limit
    StackOverflow,
    /// Allocation failed
    OutOfMemory,
    /// Heap invariant violation
    Fatal(HeapError),
}

impl From<HeapError> for Interrupt {
    fn from(e: HeapError) -> Self {
        if e.is_out_of_memory() {
            Interrupt::OutOfMemory
        } else {
            Interrupt::Fatal(e)
        }
    }
}

impl Interrupt {
    /// Panic with a fixed message
    pub fn msg(msg: &'static str) -> Self {
        Interrupt::Panic(Panic::StaticMsg(msg))
    }
}

/// Panic recorded when an execution ends with `ResultCode::Panic`
#[derive(Debug, Clone, PartialEq)]
pub struct PanicPayload {
    /// What went wrong
    pub panic: Panic,
    /// Symbolized trace, innermost first
    pub frames: Vec<StackFrame>,
}

impl PanicPayload {
    /// The payload tag
    pub fn panic_type(&self) -> PanicType {
        self.panic.panic_type()
    }
}

/// Errors returned to the host
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Allocation failed
    #[error("out of memory")]
    OutOfMemory,
    /// Stack limit exceeded
    #[error("stack overflow")]
    StackOverflow,
    /// Execution panicked
    #[error("panic: {0}")]
    Panic(Panic),
    /// A host call ended with an uncaught thrown value
    #[error("uncaught throw: {0:?}")]
    Throw(Value),
    /// Heap invariant violation
    #[error(transparent)]
    Heap(HeapError),
    /// The chunk failed validation
    #[error(transparent)]
    InvalidProgram(#[from] ChunkError),
    /// The chunk names a native function the registry does not have
    #[error("unknown native function `{0}`")]
    UnknownNative(String),
    /// The chunk binds a native with a different parameter count than registered
    #[error("native function `{name}` takes {expected} arguments, chunk declares {found}")]
    NativeArity {
        /// Native name
        name: String,
        /// Registered parameter count
        expected: u8,
        /// Arity of the chunk's signature
        found: usize,
    },
    /// No function symbol or function table entry by that name
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// Not a user type of the loaded chunk
    #[error("unknown type id {0}")]
    UnknownType(TypeId),
    /// No chunk has been loaded
    #[error("no program loaded")]
    NotLoaded,
}

impl From<HeapError> for VmError {
    fn from(e: HeapError) -> Self {
        if e.is_out_of_memory() {
            VmError::OutOfMemory
        } else {
            VmError::Heap(e)
        }
    }
}

impl From<Interrupt> for VmError {
    fn from(i: Interrupt) -> Self {
        match i {
            Interrupt::Throw(v) => VmError::Throw(v),
            Interrupt::Panic(p) => VmError::Panic(p),
            Interrupt::StackOverflow => VmError::StackOverflow,
            Interrupt::OutOfMemory => VmError::OutOfMemory,
            Interrupt::Fatal(e) => VmError::Heap(e),
        }
    }
}

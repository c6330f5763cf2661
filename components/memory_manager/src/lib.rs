//! Memory Manager - reference-counted object heap
//!
//! This component provides:
//! - A pooled slab allocator with a free list and page growth
//! - An external allocation path with byte accounting
//! - Heap object variants (objects, lists, maps, boxes, closures, fibers, ...)
//! - The retain/release protocol with iterative teardown
//! - Generation checks classifying double frees and dangling retains
//! - Cycle diagnostics (no automatic cycle collection)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
pub mod fiber;
pub mod heap;
pub mod object;
pub mod rc;
pub mod value_map;

pub use error::HeapError;
pub use fiber::{CallFrame, ExecState, FiberData, FiberState, TryFrame, HOST_RET_PC};
pub use heap::{Heap, HeapConfig};
pub use object::{
    ClosureData, FuncRef, HeapObject, NativeFuncData, ObjectData, ObjectFields, INLINE_FIELDS,
};
pub use rc::CycleReport;
pub use value_map::{KeyContext, ValueMap};

//! Heap errors

use core_types::ObjectId;

/// Failure of a heap operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// Object slots or external bytes are exhausted
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Bytes (or slots) requested
        requested: usize,
    },
    /// Release of an object that was already freed
    #[error("double free of {0}")]
    DoubleFree(ObjectId),
    /// Retain of an object that was already freed
    #[error("retain of freed object {0}")]
    DanglingRetain(ObjectId),
    /// Handle whose slot has been reused or never existed
    #[error("stale handle {0}")]
    StaleHandle(ObjectId),
    /// Object exists but holds a different payload
    #[error("{id} is not a {expected}")]
    TypeMismatch {
        /// Object
        id: ObjectId,
        /// Expected payload
        expected: &'static str,
    },
}

impl HeapError {
    /// Whether this is resource exhaustion rather than an invariant violation
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, HeapError::OutOfMemory { .. })
    }
}

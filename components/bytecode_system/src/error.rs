//! Chunk loading and validation errors

use crate::opcode::Pc;

/// Error produced while loading or validating a chunk
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// Malformed JSON
    #[error("invalid chunk json: {0}")]
    Json(#[from] serde_json::Error),
    /// The chunk has no instructions
    #[error("chunk has no instructions")]
    Empty,
    /// A branch target lies outside the instruction stream
    #[error("instruction {pc}: branch target {target} out of range")]
    TargetOutOfRange {
        /// Offending instruction
        pc: Pc,
        /// Target
        target: Pc,
    },
    /// A constant index lies outside the pool
    #[error("instruction {pc}: constant {idx} out of range")]
    ConstantOutOfRange {
        /// Offending instruction
        pc: Pc,
        /// Constant index
        idx: u32,
    },
    /// A table id does not resolve
    #[error("instruction {pc}: unknown {table} {id}")]
    UnknownRef {
        /// Offending instruction or table entry
        pc: Pc,
        /// Table name
        table: &'static str,
        /// Id
        id: u32,
    },
}

//! Error types for the CLI

use bytecode_system::ChunkError;
use interpreter::VmError;

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The program file is not a valid chunk
    #[error("invalid program: {0}")]
    Chunk(#[from] ChunkError),

    /// The VM refused the program
    #[error("vm error: {0}")]
    Vm(#[from] VmError),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

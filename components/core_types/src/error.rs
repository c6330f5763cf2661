//! Result codes and the panic taxonomy reported to the host.
//!
//! Execution never unwinds past the host boundary. Every run ends with a
//! [`ResultCode`]; when that code is [`ResultCode::Panic`] the VM also holds a
//! [`Panic`] describing what went wrong.

use serde::{Deserialize, Serialize};

use crate::Value;

/// Terminal outcome of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// Program ran to `End` or returned to the host normally
    Success,
    /// An unrecoverable error ended execution; see the panic payload
    Panic,
    /// A call would have grown the value stack past its configured limit
    StackOverflow,
    /// An allocation failed outside of panic handling
    OutOfMemory,
    /// Internal invariant violation (double free, dangling retain, corrupt program)
    Unknown,
}

impl ResultCode {
    /// Process exit code used by the command line host
    pub fn exit_code(self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::Panic => 1,
            ResultCode::StackOverflow => 2,
            ResultCode::OutOfMemory => 3,
            ResultCode::Unknown => 4,
        }
    }
}

/// Tag of a panic payload. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanicType {
    /// Uncaught thrown value
    UncaughtError,
    /// Static diagnostic message
    StaticMsg,
    /// Dynamically formatted message
    Msg,
    /// Error value thrown from a native function and never caught
    NativeThrow,
    /// Out of memory while already building a panic; the original error is lost
    InflightOom,
    /// No panic recorded
    None,
}

/// Panic payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Panic {
    /// A thrown value reached the top of the main fiber
    #[error("uncaught error: {0:?}")]
    UncaughtError(Value),
    /// Fixed diagnostic
    #[error("{0}")]
    StaticMsg(&'static str),
    /// Formatted diagnostic
    #[error("{0}")]
    Msg(String),
    /// A value thrown by a native function was never caught
    #[error("uncaught error from native call: {0:?}")]
    NativeThrow(Value),
    /// Allocation failed while building another panic. Masks the original error.
    #[error("out of memory while handling a panic")]
    InflightOom,
}

impl Panic {
    /// The tag of this payload
    pub fn panic_type(&self) -> PanicType {
        match self {
            Panic::UncaughtError(_) => PanicType::UncaughtError,
            Panic::StaticMsg(_) => PanicType::StaticMsg,
            Panic::Msg(_) => PanicType::Msg,
            Panic::NativeThrow(_) => PanicType::NativeThrow,
            Panic::InflightOom => PanicType::InflightOom,
        }
    }

    /// The thrown value, for payloads that carry one
    pub fn error_value(&self) -> Option<Value> {
        match self {
            Panic::UncaughtError(v) | Panic::NativeThrow(v) => Some(*v),
            _ => None,
        }
    }
}

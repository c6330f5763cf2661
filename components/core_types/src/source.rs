//! Source positions and stack frames for error reporting.
//!
//! The interpreter records a [`CompactFrame`] per live call while unwinding
//! toward a panic. Those are resolved to [`StackFrame`]s against the chunk's
//! debug table only when a trace is actually printed.

use serde::{Deserialize, Serialize};

/// A position in source text.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition { line: 10, column: 5, offset: 150 };
/// assert_eq!(pos.to_string(), "10:5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    /// 1-indexed line
    pub line: u32,
    /// 1-indexed column
    pub column: u32,
    /// Byte offset from the start of the source file
    #[serde(default)]
    pub offset: usize,
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A call frame captured at panic time, before symbolization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompactFrame {
    /// Instruction index of the call site (or the faulting instruction for the top frame)
    pub pc: u32,
    /// Frame base on the value stack
    pub fp: u32,
}

/// A symbolized frame in a stack trace.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("fib".to_string()),
///     source_url: Some("main.cy".to_string()),
///     line: 25,
///     column: 10,
///     pc: 40,
/// };
/// assert_eq!(frame.to_string(), "fib (main.cy:25:10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Enclosing function, `None` for the top-level chunk
    pub function_name: Option<String>,
    /// Source file, if known
    pub source_url: Option<String>,
    /// Line of the call
    pub line: u32,
    /// Column of the call
    pub column: u32,
    /// Instruction index the frame was resolved from
    pub pc: u32,
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("main");
        let url = self.source_url.as_deref().unwrap_or("<unknown>");
        write!(f, "{} ({}:{}:{})", name, url, self.line, self.column)
    }
}

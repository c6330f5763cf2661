//! VM configuration

use memory_manager::HeapConfig;
use serde::{Deserialize, Serialize};

/// Options consumed at startup. They affect attached metadata and
/// persistence across evaluations, never opcode semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// No persistent reload state; `deinit` skips teardown of statics and the cycle check
    pub single_run: bool,
    /// Exposed for the host module loader
    pub enable_file_modules: bool,
    /// Keep static variables and static function rebinds across evaluations
    pub reload: bool,
    /// Debug tables cover every pc, so traces resolve by exact pc
    pub gen_all_debug_syms: bool,
}

/// Interpreter limits and diagnostics.
///
/// # Examples
///
/// ```
/// use interpreter::VmConfig;
///
/// let config = VmConfig::default().with_max_stack_len(4096).with_trace(true);
/// assert_eq!(config.max_stack_len, 4096);
/// assert!(config.trace);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Logical limit on stack slots per fiber
    pub max_stack_len: usize,
    /// Slots allocated for the main stack up front
    pub initial_stack_len: usize,
    /// Heap limits
    pub heap: HeapConfig,
    /// Count executed opcodes
    pub trace: bool,
    /// Echo `print` output to stdout as well as capturing it
    pub echo_print: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_len: 1 << 20,
            initial_stack_len: 512,
            heap: HeapConfig::default(),
            trace: false,
            echo_print: false,
        }
    }
}

impl VmConfig {
    /// Set the stack limit
    pub fn with_max_stack_len(mut self, n: usize) -> Self {
        self.max_stack_len = n;
        self
    }

    /// Set the initial main stack size
    pub fn with_initial_stack_len(mut self, n: usize) -> Self {
        self.initial_stack_len = n;
        self
    }

    /// Set heap limits
    pub fn with_heap(mut self, heap: HeapConfig) -> Self {
        self.heap = heap;
        self
    }

    /// Enable opcode counting
    pub fn with_trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    /// Echo printed lines to stdout
    pub fn with_echo_print(mut self, on: bool) -> Self {
        self.echo_print = on;
        self
    }
}

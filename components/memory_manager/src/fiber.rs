//! Saved execution state of a fiber.
//!
//! The running fiber's state lives in the VM; a suspended fiber keeps its
//! stack, call frames and try frames here. Resuming swaps the two.

use core_types::Value;

/// Return pc marking a frame pushed by a host call
pub const HOST_RET_PC: u32 = u32::MAX;

/// A call record. Values stay in stack slots; this only tracks linkage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallFrame {
    /// Caller pc to continue at
    pub ret_pc: u32,
    /// Caller frame pointer
    pub prev_fp: u32,
    /// Number of values the caller expects (0 or 1)
    pub req_num_ret_vals: u8,
    /// Pc of the call instruction, used for traces and unwind release sets
    pub call_pc: u32,
    /// Callee value owned by the frame, released when it returns
    pub callee: Value,
}

/// Saved recovery context for a try block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFrame {
    /// Frame pointer at `PushTry`
    pub fp: u32,
    /// Call depth at `PushTry`
    pub frame_depth: u32,
    /// Catch entry
    pub catch_pc: u32,
    /// Local receiving the caught value
    pub err_dst: u8,
}

/// Registers, stack and frames of one fiber
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecState {
    /// Value stack
    pub stack: Vec<Value>,
    /// Call records, innermost last
    pub frames: Vec<CallFrame>,
    /// Try frames, innermost last
    pub try_frames: Vec<TryFrame>,
    /// Program counter
    pub pc: u32,
    /// Frame pointer
    pub fp: u32,
}

impl ExecState {
    /// Fresh state with a stack of `len` slots
    pub fn with_stack_len(len: usize) -> Self {
        Self {
            stack: vec![Value::None; len],
            ..Default::default()
        }
    }
}

/// Fiber lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    /// Created, never resumed
    Fresh,
    /// Currently executing (or resuming a child)
    Running,
    /// Yielded
    Suspended,
    /// Finished with `Coreturn`
    Done,
    /// Terminated by an uncaught throw
    Panicked,
}

/// Fiber payload
#[derive(Debug, Clone, PartialEq)]
pub struct FiberData {
    /// Saved state; holds the resumer's state while this fiber runs
    pub exec: ExecState,
    /// Lifecycle state
    pub state: FiberState,
    /// Resumer local receiving yielded or returned values
    pub parent_dst: u8,
    /// Stack slots holding owned references while not running
    pub owned_slots: Vec<u32>,
}

impl FiberData {
    /// Fresh fiber starting at `pc` with the given stack
    pub fn new(pc: u32, stack: Vec<Value>, owned_slots: Vec<u32>) -> Self {
        Self {
            exec: ExecState {
                stack,
                pc,
                ..Default::default()
            },
            state: FiberState::Fresh,
            parent_dst: 0,
            owned_slots,
        }
    }

    /// Owned references held by a fiber that is not running
    pub fn owned_values(&self, out: &mut Vec<Value>) {
        for slot in &self.owned_slots {
            if let Some(v) = self.exec.stack.get(*slot as usize) {
                out.push(*v);
            }
        }
        out.extend(self.exec.frames.iter().map(|f| f.callee));
    }
}

//! Throw unwinding.
//!
//! A thrown value searches the innermost try frame of the running fiber.
//! Frames between the throw site and the handler are popped, releasing the
//! locals their release sets name at the pc they were suspended at. Without a
//! handler the fiber dies and the throw continues in its resumer; at the main
//! fiber it becomes an uncaught-error panic. A host call boundary stops the
//! search so the host sees the throw as an error result.

use core_types::{CompactFrame, Panic, Value};
use memory_manager::TryFrame;
use tracing::debug;

use crate::error::Interrupt;
use crate::vm::Vm;

/// Where a throw came to rest
#[derive(Debug)]
pub(crate) enum Unwound {
    /// A try frame took it; execution continues at the catch pc
    Caught,
    /// The throw left a frame entered by a host call
    HostBoundary(Value),
}

impl Vm {
    /// Call depth below which the current host call may not unwind
    fn host_floor(&self) -> Option<usize> {
        self.host_entries
            .last()
            .filter(|h| h.fiber_depth == self.fiber_stack.len())
            .map(|h| h.floor)
    }

    /// Pop the innermost frame, releasing its live locals
    fn pop_frame_unwinding(&mut self) -> Result<(), Interrupt> {
        self.throw_trace.push(CompactFrame {
            pc: self.exec.pc,
            fp: self.exec.fp,
        });
        self.release_set_at(self.exec.pc)?;
        if let Some(frame) = self.exec.frames.pop() {
            self.drop_dead_try_frames();
            self.heap.release(frame.callee)?;
            self.exec.fp = frame.prev_fp;
            self.exec.pc = frame.call_pc;
        }
        Ok(())
    }

    /// Drop try frames pushed by call frames that are no longer on the stack
    pub(crate) fn drop_dead_try_frames(&mut self) {
        let depth = self.exec.frames.len() as u32;
        while self
            .exec
            .try_frames
            .last()
            .is_some_and(|tf| tf.frame_depth > depth)
        {
            self.exec.try_frames.pop();
        }
    }

    /// Release what the throw site owns but the catch block does not
    fn release_for_catch(&mut self, catch_pc: u32) -> Result<(), Interrupt> {
        let chunk = self.chunk_rc();
        let kept = chunk.release_set(catch_pc);
        for l in chunk.release_set(self.exec.pc) {
            if !kept.contains(l) {
                self.release_local(*l)?;
            }
        }
        Ok(())
    }

    /// Innermost try frame, unless it lies below the current host call
    fn usable_try_frame(&self, floor: Option<usize>) -> Option<TryFrame> {
        self.exec
            .try_frames
            .last()
            .copied()
            .filter(|tf| !floor.is_some_and(|f| tf.frame_depth as usize <= f))
    }

    /// Unwind a thrown value to its handler
    pub(crate) fn unwind_throw(&mut self, err: Value) -> Result<Unwound, Interrupt> {
        loop {
            let floor = self.host_floor();
            if let Some(tf) = self.usable_try_frame(floor) {
                self.exec.try_frames.pop();
                while self.exec.frames.len() > tf.frame_depth as usize {
                    self.pop_frame_unwinding()?;
                }
                self.release_for_catch(tf.catch_pc)?;
                self.exec.fp = tf.fp;
                self.set_local(tf.err_dst, err);
                self.exec.pc = tf.catch_pc;
                self.throw_trace.clear();
                self.throw_from_native = false;
                debug!(catch_pc = tf.catch_pc, "throw caught");
                return Ok(Unwound::Caught);
            }

            if let Some(floor) = floor {
                while self.exec.frames.len() > floor {
                    self.pop_frame_unwinding()?;
                }
                self.throw_trace.clear();
                debug!("throw crossed a host call");
                return Ok(Unwound::HostBoundary(err));
            }

            while !self.exec.frames.is_empty() {
                self.pop_frame_unwinding()?;
            }
            self.pop_frame_unwinding()?;
            self.exec.try_frames.clear();

            if self.fiber_stack.is_empty() {
                self.pending_trace = Some(std::mem::take(&mut self.throw_trace));
                let panic = if std::mem::take(&mut self.throw_from_native) {
                    Panic::NativeThrow(err)
                } else {
                    Panic::UncaughtError(err)
                };
                return Err(Interrupt::Panic(panic));
            }
            self.abort_fiber()?;
        }
    }
}

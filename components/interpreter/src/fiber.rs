//! Fiber creation, resume, yield and completion.
//!
//! The running fiber's registers live in `Vm::exec`. A suspended fiber keeps
//! its own [`ExecState`] in its heap payload; while it runs, that payload
//! holds the resumer's state instead, so every switch is a swap. The resumer
//! retains the fiber for as long as it runs.

use bytecode_system::{Local, Pc, NULL_LOCAL};
use core_types::{ObjectId, Value, TYPE_FIBER};
use memory_manager::{ExecState, FiberData, FiberState, HeapError, ObjectData};
use tracing::debug;

use crate::error::Interrupt;
use crate::vm::{FiberLink, Vm, LOCAL_WINDOW};

impl Vm {
    fn fiber_mut(&mut self, id: ObjectId) -> Result<&mut FiberData, Interrupt> {
        match &mut self.heap.get_mut(id)?.data {
            ObjectData::Fiber(f) => Ok(f),
            _ => Err(HeapError::TypeMismatch {
                id,
                expected: "fiber",
            }
            .into()),
        }
    }

    /// Build a fiber whose body starts at `body_pc`, moving `num_args`
    /// arguments into its locals `1..=num_args`
    pub(crate) fn new_fiber(&mut self, body_pc: Pc, args: Vec<Value>) -> Result<Value, Interrupt> {
        if args.len() >= LOCAL_WINDOW {
            return Err(Interrupt::msg("Too many fiber arguments."));
        }
        let mut stack = vec![Value::None; LOCAL_WINDOW];
        let owned = (1..=args.len() as u32).collect();
        for (i, v) in args.into_iter().enumerate() {
            stack[1 + i] = v;
        }
        let data = FiberData::new(body_pc, stack, owned);
        Ok(self.heap.alloc(TYPE_FIBER, ObjectData::Fiber(Box::new(data)))?)
    }

    /// `Coinit`
    pub(crate) fn coinit(
        &mut self,
        start_args: Local,
        num_args: u8,
        body_pc: Pc,
        jump_to: Pc,
        dst: Local,
    ) -> Result<(), Interrupt> {
        let base = self.slot(start_args);
        let mut args = Vec::with_capacity(num_args as usize);
        for i in 0..num_args as usize {
            let v = self
                .exec
                .stack
                .get_mut(base + i)
                .map(std::mem::take)
                .unwrap_or_default();
            args.push(v);
        }
        let fiber = self.new_fiber(body_pc, args)?;
        debug!(body_pc, num_args, "fiber created");
        self.set_local(dst, fiber);
        self.exec.pc = jump_to;
        Ok(())
    }

    /// `Coresume`
    pub(crate) fn coresume(&mut self, fiber: Local, dst: Local) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let v = self.local(fiber);
        let id = match v {
            Value::Heap(id) if self.heap.type_id_of(v)? == TYPE_FIBER => id,
            _ => {
                self.set_local(dst, Value::None);
                self.exec.pc = pc + 1;
                return Ok(());
            }
        };
        if !matches!(self.fiber_mut(id)?.state, FiberState::Fresh | FiberState::Suspended) {
            return Err(self.throw_error(self.symbols.errors().invalid_resume));
        }
        self.heap.retain(v)?;
        self.exec.pc = pc + 1;
        let parent = std::mem::take(&mut self.exec);
        let data = self.fiber_mut(id)?;
        data.state = FiberState::Running;
        data.parent_dst = dst;
        data.owned_slots.clear();
        let own = std::mem::replace(&mut data.exec, parent);
        self.exec = own;
        self.fiber_stack.push(FiberLink {
            fiber: id,
            host_depth: self.host_entries.len(),
        });
        debug!(fiber = %id, depth = self.fiber_stack.len(), "fiber resumed");
        Ok(())
    }

    /// Switch back to the resumer of the running fiber. The fiber's own state
    /// is parked in its payload. Returns the fiber and the resumer's
    /// destination local.
    fn leave_fiber(&mut self) -> Result<(ObjectId, Local), Interrupt> {
        let link = self
            .fiber_stack
            .pop()
            .ok_or(Interrupt::msg("No fiber is running."))?;
        let (parent, dst) = {
            let data = self.fiber_mut(link.fiber)?;
            (std::mem::take(&mut data.exec), data.parent_dst)
        };
        let own = std::mem::replace(&mut self.exec, parent);
        self.fiber_mut(link.fiber)?.exec = own;
        Ok((link.fiber, dst))
    }

    fn deliver(&mut self, dst: Local, v: Value) -> Result<(), Interrupt> {
        if dst == NULL_LOCAL {
            self.heap.release(v)?;
        } else {
            self.set_local(dst, v);
        }
        Ok(())
    }

    /// Absolute slots holding owned references across every frame of the
    /// running fiber
    fn live_slots(&self, pc: Pc) -> Vec<u32> {
        let mut slots: Vec<u32> = self
            .chunk
            .release_set(pc)
            .iter()
            .map(|l| self.exec.fp + *l as u32)
            .collect();
        for frame in &self.exec.frames {
            slots.extend(
                self.chunk
                    .release_set(frame.call_pc)
                    .iter()
                    .map(|l| frame.prev_fp + *l as u32),
            );
        }
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// `Coyield`. At the top level this is a no-op.
    pub(crate) fn coyield(&mut self, src: Local) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let Some(link) = self.fiber_stack.last() else {
            self.exec.pc = pc + 1;
            return Ok(());
        };
        if link.host_depth != self.host_entries.len() {
            return Err(Interrupt::msg("Cannot yield across a host call."));
        }
        let v = if src == NULL_LOCAL {
            Value::None
        } else {
            let v = self.local(src);
            self.heap.retain(v)?;
            v
        };
        let owned = self.live_slots(pc);
        self.exec.pc = pc + 1;
        let (id, dst) = self.leave_fiber()?;
        {
            let data = self.fiber_mut(id)?;
            data.state = FiberState::Suspended;
            data.owned_slots = owned;
        }
        debug!(fiber = %id, "fiber yielded");
        self.deliver(dst, v)?;
        Ok(self.heap.release(Value::Heap(id))?)
    }

    /// `Coreturn`
    pub(crate) fn coreturn(&mut self) -> Result<(), Interrupt> {
        if self.fiber_stack.is_empty() {
            return Err(Interrupt::msg("Coreturn outside of a fiber."));
        }
        let v = self.take_local(0);
        self.release_set_at(self.exec.pc)?;
        self.finish_fiber(v)
    }

    /// Complete the running fiber, handing `v` to its resumer
    pub(crate) fn finish_fiber(&mut self, v: Value) -> Result<(), Interrupt> {
        let (id, dst) = self.leave_fiber()?;
        {
            let data = self.fiber_mut(id)?;
            data.state = FiberState::Done;
            data.owned_slots.clear();
            data.exec = ExecState::default();
        }
        debug!(fiber = %id, "fiber done");
        self.deliver(dst, v)?;
        Ok(self.heap.release(Value::Heap(id))?)
    }

    /// Terminate the running fiber after an uncaught throw. Its frames must
    /// already be released. The resumer continues at its `Coresume`.
    pub(crate) fn abort_fiber(&mut self) -> Result<(), Interrupt> {
        let (id, _) = self.leave_fiber()?;
        {
            let data = self.fiber_mut(id)?;
            data.state = FiberState::Panicked;
            data.owned_slots.clear();
            data.exec = ExecState::default();
        }
        self.exec.pc = self.exec.pc.saturating_sub(1);
        debug!(fiber = %id, "fiber aborted by uncaught throw");
        Ok(self.heap.release(Value::Heap(id))?)
    }

    /// Switch back to the main state, abandoning every running fiber
    pub(crate) fn reset_fibers(&mut self) {
        while !self.fiber_stack.is_empty() {
            if self.abort_fiber().is_err() {
                self.fiber_stack.clear();
            }
        }
    }

    /// State of a fiber value
    pub fn fiber_state(&self, fiber: Value) -> Option<FiberState> {
        let id = fiber.as_heap()?;
        match &self.heap.get(id).ok()?.data {
            ObjectData::Fiber(f) => Some(f.state),
            _ => None,
        }
    }
}

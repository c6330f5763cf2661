//! Calls and returns.
//!
//! A call's frame starts at the caller's `start_local`: local 0 of the callee
//! is the return slot and its arguments follow at locals `1..=num_args`,
//! receiver first for methods. Bytecode callees, natives and closures share
//! that layout and differ only in how the entry point is found.

use bytecode_system::{Local, OpKind};
use core_types::{format_template, FmtValue, Panic, Value};
use memory_manager::{CallFrame, FuncRef, ObjectData, HOST_RET_PC};
use tracing::debug;

use crate::error::Interrupt;
use crate::symbols::{FuncBinding, FuncTarget};
use crate::vm::{Flow, Vm, LOCAL_WINDOW};

impl Vm {
    /// Reject a call whose argument count or types do not fit the callee
    pub(crate) fn check_args(&self, num_params: u8, sig: u32, args: &[Value]) -> Result<(), Interrupt> {
        if args.len() != num_params as usize {
            return Err(Interrupt::Panic(Panic::Msg(format_template(
                "Expected {} arguments, found {}.",
                &[FmtValue::U8(num_params), FmtValue::U64(args.len() as u64)],
            ))));
        }
        self.check_arg_types(sig, args)
    }

    /// Check argument values against a typed signature
    pub(crate) fn check_arg_types(&self, sig: u32, args: &[Value]) -> Result<(), Interrupt> {
        let Some(decl) = self.symbols.sig(sig) else {
            return Ok(());
        };
        if !decl.is_typed() {
            return Ok(());
        }
        let mut ok = decl.arity() == args.len();
        if ok {
            for (v, sema) in args.iter().zip(&decl.params) {
                if !self.satisfies(self.heap.type_id_of(*v)?, *sema) {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Ok(());
        }
        let mut found = Vec::with_capacity(args.len());
        for v in args {
            found.push(self.type_name(self.heap.type_id_of(*v)?));
        }
        let expected: Vec<String> = decl.params.iter().map(|p| self.sema_name(*p)).collect();
        Err(Interrupt::Panic(Panic::Msg(format!(
            "incompatible func signature: called with ({}), expected ({})",
            found.join(", "),
            expected.join(", ")
        ))))
    }

    /// Borrowed argument window of a call at `start_local`
    fn args_at(&self, start_local: Local, num_args: u8) -> Result<&[Value], Interrupt> {
        let base = self.slot(start_local) + 1;
        self.exec
            .stack
            .get(base..base + num_args as usize)
            .ok_or(Interrupt::msg("Argument window out of range."))
    }

    /// `CallTypeCheck`
    pub(crate) fn call_type_check(&self, arg_start: Local, num_args: u8, sig: u32) -> Result<(), Interrupt> {
        let base = self.slot(arg_start);
        let args = self
            .exec
            .stack
            .get(base..base + num_args as usize)
            .ok_or(Interrupt::msg("Argument window out of range."))?;
        self.check_arg_types(sig, args)
    }

    /// Push a bytecode frame. `callee` is owned by the frame.
    pub(crate) fn call_func(
        &mut self,
        func: FuncRef,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
        callee: Value,
    ) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let new_fp = self.exec.fp + start_local as u32;
        self.ensure_frame(new_fp, func.stack_size.max(num_args.saturating_add(1)))?;
        let checked = self.check_args(func.num_params, func.sig, self.args_at(start_local, num_args)?);
        if let Err(e) = checked {
            self.heap.release(callee)?;
            return Err(e);
        }
        self.exec.frames.push(CallFrame {
            ret_pc: pc + 1,
            prev_fp: self.exec.fp,
            req_num_ret_vals: num_ret,
            call_pc: pc,
            callee,
        });
        self.exec.fp = new_fp;
        self.exec.pc = func.pc;
        Ok(())
    }

    /// Call a native in place. The argument window and `callee` are released
    /// after it returns.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn call_native(
        &mut self,
        native: u32,
        num_params: u8,
        sig: u32,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
        callee: Value,
    ) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let base = self.slot(start_local);
        self.ensure_frame(base as u32, num_args.saturating_add(1))?;
        let args = self.args_at(start_local, num_args)?.to_vec();
        if let Err(e) = self.check_args(num_params, sig, &args) {
            self.heap.release(callee)?;
            return Err(e);
        }
        let func = self
            .natives
            .get(native)
            .map(|n| n.func)
            .ok_or(Interrupt::msg("Unknown native function."))?;

        let saved_base = self.host_base;
        self.host_base = (base + LOCAL_WINDOW) as u32;
        let result = func(self, &args);
        self.host_base = saved_base;

        for i in 0..num_args as usize {
            let v = std::mem::take(&mut self.exec.stack[base + 1 + i]);
            self.heap.release(v)?;
        }
        self.heap.release(callee)?;
        match result {
            Ok(v) => {
                if num_ret == 0 {
                    self.heap.release(v)?;
                } else {
                    self.exec.stack[base] = v;
                }
                self.exec.pc = pc + 1;
                Ok(())
            }
            Err(Interrupt::Throw(e)) => {
                self.throw_from_native = true;
                self.exec.pc = pc;
                Err(Interrupt::Throw(e))
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn call_target(
        &mut self,
        target: FuncTarget,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
        callee: Value,
    ) -> Result<(), Interrupt> {
        match target {
            FuncTarget::Func(f) => self.call_func(f, start_local, num_args, num_ret, callee),
            FuncTarget::Native {
                native,
                num_params,
                sig,
            } => self.call_native(native, num_params, sig, start_local, num_args, num_ret, callee),
        }
    }

    /// Call a function value. Ownership of `callee` moves into the call.
    pub(crate) fn call_value_at(
        &mut self,
        callee: Value,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
    ) -> Result<(), Interrupt> {
        let resolved = match callee {
            Value::Heap(id) => match &self.heap.get(id)?.data {
                ObjectData::Lambda(f) => Some((FuncTarget::Func(*f), None)),
                ObjectData::Closure(c) => Some((FuncTarget::Func(c.func), Some(c.closure_local))),
                ObjectData::NativeFunc(n) => Some((
                    FuncTarget::Native {
                        native: n.native,
                        num_params: n.num_params,
                        sig: n.sig,
                    },
                    None,
                )),
                _ => None,
            },
            _ => None,
        };
        let Some((target, closure_local)) = resolved else {
            self.heap.release(callee)?;
            return Err(self.throw_invalid_argument());
        };
        self.call_target(target, start_local, num_args, num_ret, callee)?;
        if let (FuncTarget::Func(_), Some(l)) = (target, closure_local) {
            self.set_local(l, callee);
        }
        Ok(())
    }

    /// `CallSym`
    pub(crate) fn call_sym(
        &mut self,
        func: u32,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
    ) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let generation = self.symbols.generation();
        if let Some(target) = self.caches.call(pc, func, generation) {
            self.count(match target {
                FuncTarget::Func(_) => OpKind::CallFuncIC,
                FuncTarget::Native { .. } => OpKind::CallNativeFuncIC,
            });
            return self.call_target(target, start_local, num_args, num_ret, Value::None);
        }
        self.count(OpKind::CallSym);
        let binding = self
            .symbols
            .func(func)
            .map(|s| s.binding)
            .ok_or(Interrupt::msg("Unknown function symbol."))?;
        match binding {
            FuncBinding::Target(target) => {
                self.caches.set_call(pc, func, target, generation);
                self.call_target(target, start_local, num_args, num_ret, Value::None)
            }
            FuncBinding::Value(v) => {
                self.heap.retain(v)?;
                self.call_value_at(v, start_local, num_args, num_ret)
            }
        }
    }

    /// `CallObjSym`: dispatch on the receiver's runtime type
    pub(crate) fn call_obj_sym(
        &mut self,
        method: u32,
        start_local: Local,
        num_args: u8,
        num_ret: u8,
    ) -> Result<(), Interrupt> {
        let pc = self.exec.pc;
        let recv = self
            .args_at(start_local, num_args)?
            .first()
            .copied()
            .ok_or(Interrupt::msg("Method call without a receiver."))?;
        let type_id = self.heap.type_id_of(recv)?;
        let generation = self.symbols.generation();
        if let Some(target) = self.caches.call(pc, type_id, generation) {
            self.count(match target {
                FuncTarget::Func(_) => OpKind::CallObjFuncIC,
                FuncTarget::Native { .. } => OpKind::CallObjNativeFuncIC,
            });
            return self.call_target(target, start_local, num_args, num_ret, Value::None);
        }
        self.count(OpKind::CallObjSym);
        let Some(target) = self.symbols.method(type_id, method) else {
            return Err(self.throw_error(self.symbols.errors().missing_symbol));
        };
        debug!(pc, type_id, "method call site specialized");
        self.caches.set_call(pc, type_id, target, generation);
        self.call_target(target, start_local, num_args, num_ret, Value::None)
    }

    /// `Ret1` / `Ret0`
    pub(crate) fn ret(&mut self, has_value: bool) -> Result<Flow, Interrupt> {
        let pc = self.exec.pc;
        self.release_set_at(pc)?;
        if !has_value {
            self.set_local(0, Value::None);
        }
        let Some(frame) = self.exec.frames.pop() else {
            if !self.fiber_stack.is_empty() {
                let v = self.take_local(0);
                self.finish_fiber(v)?;
                return Ok(Flow::Next);
            }
            return Ok(Flow::End);
        };
        self.drop_dead_try_frames();
        self.heap.release(frame.callee)?;
        let ret_slot = self.exec.fp as usize;
        self.exec.fp = frame.prev_fp;
        if frame.ret_pc == HOST_RET_PC {
            let v = std::mem::take(&mut self.exec.stack[ret_slot]);
            return Ok(Flow::Return(v));
        }
        if frame.req_num_ret_vals == 0 {
            let v = std::mem::take(&mut self.exec.stack[ret_slot]);
            self.heap.release(v)?;
        }
        self.exec.pc = frame.ret_pc;
        Ok(Flow::Next)
    }
}

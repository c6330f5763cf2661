//! Host-side API: calling into the VM and building values for natives.
//!
//! A host call pushes a frame whose return pc is [`HOST_RET_PC`] above
//! everything live and runs the dispatch loop until that frame returns. A
//! throw that reaches the frame stops there and comes back as
//! [`Interrupt::Throw`].

use core_types::{FmtValue, Panic, TypeId, Value, TYPE_CLOSURE, TYPE_LAMBDA, TYPE_LIST};
use memory_manager::{CallFrame, ClosureData, FuncRef, ObjectData, ObjectFields, ValueMap, HOST_RET_PC};
use tracing::trace;

use crate::error::{Interrupt, VmError};
use crate::symbols::{FuncBinding, FuncTarget};
use crate::vm::{HostEntry, Vm, LOCAL_WINDOW};

impl Vm {
    /// Call a function value with borrowed arguments, returning an owned result.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{BytecodeChunk, FuncDecl, FuncSig, Opcode};
    /// use core_types::Value;
    /// use interpreter::Vm;
    ///
    /// let mut chunk = BytecodeChunk::new();
    /// chunk.main_stack_size = 2;
    /// chunk.emit(Opcode::Lambda { func: 0, dst: 1 });
    /// chunk.emit(Opcode::End);
    /// let body = chunk.next_pc();
    /// chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 0 });
    /// chunk.emit(Opcode::Ret1);
    /// let sig = chunk.add_sig(FuncSig::untyped(2));
    /// chunk.add_func(FuncDecl { name: "add".into(), pc: body, num_params: 2, stack_size: 3, sig });
    ///
    /// let mut vm = Vm::default();
    /// vm.load(chunk).unwrap();
    /// vm.execute();
    /// let f = vm.local(1);
    /// let sum = vm.call_value(f, &[Value::Integer(2), Value::Integer(40)]).unwrap();
    /// assert_eq!(sum, Value::Integer(42));
    /// ```
    pub fn call_value(&mut self, callee: Value, args: &[Value]) -> Result<Value, Interrupt> {
        let target = match callee {
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
        let Some((target, closure_local)) = target else {
            return Err(self.throw_invalid_argument());
        };
        self.call_target_from_host(target, closure_local, callee, args)
    }

    fn call_target_from_host(
        &mut self,
        target: FuncTarget,
        closure_local: Option<u8>,
        callee: Value,
        args: &[Value],
    ) -> Result<Value, Interrupt> {
        match target {
            FuncTarget::Func(f) => self.enter_host_frame(f, closure_local, callee, args),
            FuncTarget::Native {
                native,
                num_params,
                sig,
            } => {
                self.check_args(num_params, sig, args)?;
                let func = self
                    .natives
                    .get(native)
                    .map(|n| n.func)
                    .ok_or(Interrupt::msg("Unknown native function."))?;
                func(self, args)
            }
        }
    }

    fn enter_host_frame(
        &mut self,
        func: FuncRef,
        closure_local: Option<u8>,
        callee: Value,
        args: &[Value],
    ) -> Result<Value, Interrupt> {
        self.check_args(func.num_params, func.sig, args)?;
        let fp = self.host_base;
        self.ensure_frame(fp, func.stack_size)?;
        let base = fp as usize;
        for (i, a) in args.iter().enumerate() {
            self.heap.retain(*a)?;
            self.exec.stack[base + 1 + i] = *a;
        }
        self.exec.stack[base] = Value::None;
        self.heap.retain(callee)?;

        let (saved_pc, saved_fp, saved_base) = (self.exec.pc, self.exec.fp, self.host_base);
        self.host_entries.push(HostEntry {
            floor: self.exec.frames.len(),
            fiber_depth: self.fiber_stack.len(),
        });
        self.exec.frames.push(CallFrame {
            ret_pc: HOST_RET_PC,
            prev_fp: saved_fp,
            req_num_ret_vals: 1,
            call_pc: saved_pc,
            callee,
        });
        self.exec.fp = fp;
        self.host_base = fp + LOCAL_WINDOW as u32;
        if let Some(l) = closure_local {
            self.set_local(l, callee);
        }
        self.exec.pc = func.pc;
        trace!(pc = func.pc, fp, "host call");

        let result = self.run();
        self.host_entries.pop();
        self.host_base = saved_base;
        match result {
            Ok(v) => {
                self.exec.pc = saved_pc;
                self.exec.fp = saved_fp;
                Ok(v.unwrap_or_default())
            }
            Err(Interrupt::Throw(e)) => {
                self.exec.pc = saved_pc;
                self.exec.fp = saved_fp;
                Err(Interrupt::Throw(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Call a function symbol by name
    pub fn call_func_sym(&mut self, name: &str, args: &[Value]) -> Result<Value, VmError> {
        let binding = self
            .symbols
            .func_id(name)
            .and_then(|id| self.symbols.func(id))
            .map(|s| s.binding)
            .ok_or_else(|| VmError::UnknownFunction(name.to_string()))?;
        let result = match binding {
            FuncBinding::Target(target) => self.call_target_from_host(target, None, Value::None, args),
            FuncBinding::Value(v) => self.call_value(v, args),
        };
        Ok(result?)
    }

    /// New list owning `items`
    pub fn alloc_list(&mut self, items: Vec<Value>) -> Result<Value, VmError> {
        Ok(self.heap.alloc(TYPE_LIST, ObjectData::List(items))?)
    }

    /// New map; keys are retained, values move in
    pub fn alloc_map(&mut self, entries: &[(Value, Value)]) -> Result<Value, VmError> {
        let map = self.heap.alloc_map(ValueMap::new())?;
        let Value::Heap(id) = map else {
            return Ok(map);
        };
        let chunk = self.chunk_rc();
        for (k, v) in entries {
            if let Some(old) = self.heap.map_set(id, *k, *v, chunk.string_buffer())? {
                self.heap.release(old)?;
            }
        }
        Ok(map)
    }

    /// New user object; `fields` move in, in declaration order
    pub fn alloc_object(&mut self, type_id: TypeId, fields: Vec<Value>) -> Result<Value, VmError> {
        let expected = self
            .chunk
            .type_decl(type_id)
            .map(|t| t.fields.len())
            .ok_or(VmError::UnknownType(type_id))?;
        if expected != fields.len() {
            return Err(VmError::Panic(Panic::Msg(format!(
                "Expected {expected} fields for `{}`, found {}.",
                self.type_name(type_id),
                fields.len()
            ))));
        }
        Ok(self.heap.alloc_object(type_id, fields)?)
    }

    /// New heap string
    pub fn alloc_string(&mut self, s: &str) -> Result<Value, VmError> {
        Ok(self.heap.alloc_string(s)?)
    }

    /// String built by interleaving `strs` with the display text of `exprs`
    pub fn alloc_string_template(&mut self, strs: &[&str], exprs: &[Value]) -> Result<Value, VmError> {
        let mut out = String::new();
        for (i, s) in strs.iter().enumerate() {
            out.push_str(s);
            if let Some(v) = exprs.get(i) {
                out.push_str(&self.value_to_string(*v));
            }
        }
        self.alloc_string(&out)
    }

    fn func_ref_of(&self, func: u32) -> Result<FuncRef, VmError> {
        let decl = self
            .chunk
            .funcs
            .get(func as usize)
            .ok_or(VmError::UnknownFunction(format!("#{func}")))?;
        Ok(FuncRef {
            func_id: func,
            pc: decl.pc,
            num_params: decl.num_params,
            stack_size: decl.stack_size,
            sig: decl.sig,
        })
    }

    /// Function value for a bytecode function
    pub fn alloc_lambda(&mut self, func: u32) -> Result<Value, VmError> {
        let f = self.func_ref_of(func)?;
        Ok(self.heap.alloc_pool_object(TYPE_LAMBDA, ObjectData::Lambda(f))?)
    }

    /// Closure over `captured` boxes, which move in
    pub fn alloc_closure(&mut self, func: u32, closure_local: u8, captured: Vec<Value>) -> Result<Value, VmError> {
        let data = ClosureData {
            func: self.func_ref_of(func)?,
            closure_local,
            captured: ObjectFields::from_vec(captured),
        };
        Ok(self.heap.alloc(TYPE_CLOSURE, ObjectData::Closure(data))?)
    }

    /// Fiber running a bytecode function; `args` move in
    pub fn alloc_fiber(&mut self, func: u32, args: Vec<Value>) -> Result<Value, VmError> {
        let f = self.func_ref_of(func)?;
        Ok(self.new_fiber(f.pc, args)?)
    }

    /// Retained element of a list or map
    pub fn get_index(&mut self, recv: Value, index: Value) -> Result<Value, VmError> {
        Ok(self.index_value(recv, index)?)
    }

    /// Store into a list or map; `value` moves in and the old value is released
    pub fn set_index(&mut self, recv: Value, index: Value, value: Value) -> Result<(), VmError> {
        Ok(self.set_index_value(recv, index, value, true)?)
    }

    /// Panic with a formatted message, for natives to return
    pub fn panic_fmt(&self, format: &str, args: &[FmtValue]) -> Interrupt {
        Interrupt::Panic(Panic::Msg(core_types::format_template(format, args)))
    }

    /// Storage offset of a named field in a user type
    pub fn field_offset(&self, type_id: TypeId, field: &str) -> Option<usize> {
        let decl = self.chunk.type_decl(type_id)?;
        decl.fields.iter().position(|f| f.name == field)
    }
}

//! The instruction dispatch loop.
//!
//! `run` fetches the instruction at `pc` and executes it until the program
//! ends, a host-entered frame returns, or an interrupt escapes. Throws are
//! unwound here; everything else propagates to the caller with the trace
//! captured at the failing instruction.

use bytecode_system::{BytecodeChunk, Local, OpKind, Opcode};
use core_types::{Panic, Value, TYPE_CLOSURE, TYPE_LAMBDA, TYPE_LIST, TYPE_METATYPE, TYPE_NATIVE_FUNC};
use memory_manager::{ClosureData, FuncRef, NativeFuncData, ObjectData, ObjectFields, TryFrame, ValueMap};
use tracing::debug;

use crate::access::FieldWrite;
use crate::error::Interrupt;
use crate::symbols::{FuncBinding, FuncTarget};
use crate::unwind::Unwound;
use crate::vm::{Flow, Vm};

/// Codes whose handlers account for themselves, under the cached kind on a hit
fn counted_by_handler(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::CallObjSym
            | OpKind::CallSym
            | OpKind::Field
            | OpKind::FieldRetain
            | OpKind::SetField
            | OpKind::SetFieldRelease
            | OpKind::SetCheckFieldRelease
    )
}

impl Vm {
    /// Execute from the current pc
    pub(crate) fn run(&mut self) -> Result<Option<Value>, Interrupt> {
        let chunk = self.chunk_rc();
        loop {
            let Some(op) = chunk.instructions.get(self.exec.pc as usize) else {
                return Err(self.fail_at_pc(Interrupt::msg("Program counter out of range.")));
            };
            match self.step(&chunk, op) {
                Ok(Flow::Next) => {}
                Ok(Flow::Return(v)) => return Ok(Some(v)),
                Ok(Flow::End) => return Ok(None),
                Err(Interrupt::Throw(err)) => match self.unwind_throw(err) {
                    Ok(Unwound::Caught) => {}
                    Ok(Unwound::HostBoundary(err)) => return Err(Interrupt::Throw(err)),
                    Err(e) => return Err(self.fail_at_pc(e)),
                },
                Err(e) => return Err(self.fail_at_pc(e)),
            }
        }
    }

    /// Keep the first trace captured for a failure
    fn fail_at_pc(&mut self, e: Interrupt) -> Interrupt {
        if self.pending_trace.is_none() {
            self.pending_trace = Some(self.capture_trace());
        }
        e
    }

    fn int(&self, l: Local) -> Result<i64, Interrupt> {
        self.local(l)
            .as_integer()
            .ok_or_else(|| self.throw_invalid_argument())
    }

    fn float(&self, l: Local) -> Result<f64, Interrupt> {
        self.local(l)
            .as_float()
            .ok_or_else(|| self.throw_invalid_argument())
    }

    fn ints(&self, left: Local, right: Local) -> Result<(i64, i64), Interrupt> {
        Ok((self.int(left)?, self.int(right)?))
    }

    fn floats(&self, left: Local, right: Local) -> Result<(f64, f64), Interrupt> {
        Ok((self.float(left)?, self.float(right)?))
    }

    fn func_ref(&self, chunk: &BytecodeChunk, func: u32) -> Result<FuncRef, Interrupt> {
        let decl = chunk
            .funcs
            .get(func as usize)
            .ok_or(Interrupt::msg("Unknown function."))?;
        Ok(FuncRef {
            func_id: func,
            pc: decl.pc,
            num_params: decl.num_params,
            stack_size: decl.stack_size,
            sig: decl.sig,
        })
    }

    fn division_by_zero(&self) -> Interrupt {
        self.throw_error(self.symbols.errors().division_by_zero)
    }

    fn step(&mut self, chunk: &BytecodeChunk, op: &Opcode) -> Result<Flow, Interrupt> {
        let pc = self.exec.pc;
        let kind = op.kind();
        if !counted_by_handler(kind) {
            self.count(kind);
        }
        match op {
            Opcode::ConstOp { idx, dst } => {
                let v = chunk
                    .constant(*idx)
                    .ok_or(Interrupt::msg("Constant index out of range."))?;
                self.set_local(*dst, v);
            }
            Opcode::ConstI8 { val, dst } => self.set_local(*dst, Value::Integer(*val as i64)),
            Opcode::True { dst } => self.set_local(*dst, Value::Bool(true)),
            Opcode::False { dst } => self.set_local(*dst, Value::Bool(false)),
            Opcode::None { dst } => self.set_local(*dst, Value::None),
            Opcode::Not { src, dst } => {
                let v = self.local(*src);
                self.set_local(*dst, Value::Bool(!v.is_truthy()));
            }

            Opcode::Copy { src, dst } => {
                let v = self.local(*src);
                self.set_local(*dst, v);
            }
            Opcode::CopyReleaseDst { src, dst } => {
                if src != dst {
                    let v = self.local(*src);
                    self.release_local(*dst)?;
                    self.set_local(*dst, v);
                }
            }
            Opcode::CopyRetainSrc { src, dst } => {
                let v = self.local(*src);
                self.heap.retain(v)?;
                self.set_local(*dst, v);
            }
            Opcode::CopyRetainRelease { src, dst } => {
                let v = self.local(*src);
                self.heap.retain(v)?;
                let old = self.local(*dst);
                self.set_local(*dst, v);
                self.heap.release(old)?;
            }

            Opcode::SetIndex { recv, index, right } => self.set_index_op(*recv, *index, *right, false)?,
            Opcode::SetIndexRelease { recv, index, right } => {
                self.set_index_op(*recv, *index, *right, true)?
            }
            Opcode::IndexList { recv, index, dst } | Opcode::IndexMap { recv, index, dst } => {
                self.index_op(*recv, *index, *dst)?
            }
            Opcode::List { start, len, dst } => {
                let items = self.window(*start, *len as usize)?.to_vec();
                let list = self.heap.alloc(TYPE_LIST, ObjectData::List(items))?;
                self.set_local(*dst, list);
            }
            Opcode::Map { start, num_entries, dst } => self.build_map(*start, *num_entries, *dst)?,
            Opcode::MapEmpty { dst } => {
                let map = self.heap.alloc_map(ValueMap::new())?;
                self.set_local(*dst, map);
            }
            Opcode::SliceList { recv, start, end, dst } => self.slice_list(*recv, *start, *end, *dst)?,

            Opcode::JumpNotCond { cond, target } => {
                if !self.local(*cond).is_truthy() {
                    self.exec.pc = *target;
                    return Ok(Flow::Next);
                }
            }
            Opcode::JumpCond { cond, target } => {
                if self.local(*cond).is_truthy() {
                    self.exec.pc = *target;
                    return Ok(Flow::Next);
                }
            }
            Opcode::Jump { target } => {
                self.exec.pc = *target;
                return Ok(Flow::Next);
            }
            Opcode::JumpNotNone { src, target } => {
                if !self.local(*src).is_none() {
                    self.exec.pc = *target;
                    return Ok(Flow::Next);
                }
            }

            Opcode::Release { local } => self.release_local(*local)?,
            Opcode::ReleaseN { locals } => {
                for l in locals {
                    self.release_local(*l)?;
                }
            }
            Opcode::Retain { local } => {
                let v = self.local(*local);
                self.heap.retain(v)?;
            }

            Opcode::CallObjSym {
                start_local,
                num_args,
                num_ret,
                method,
            } => {
                self.call_obj_sym(*method, *start_local, *num_args, *num_ret)?;
                return Ok(Flow::Next);
            }
            Opcode::CallTypeCheck { arg_start, num_args, sig } => {
                self.call_type_check(*arg_start, *num_args, *sig)?
            }
            Opcode::CallSym {
                start_local,
                num_args,
                num_ret,
                func,
            } => {
                self.call_sym(*func, *start_local, *num_args, *num_ret)?;
                return Ok(Flow::Next);
            }
            Opcode::Call {
                start_local,
                num_args,
                num_ret,
            } => {
                let callee = self.take_local(*start_local);
                self.call_value_at(callee, *start_local, *num_args, *num_ret)?;
                return Ok(Flow::Next);
            }
            Opcode::Ret1 => return self.ret(true),
            Opcode::Ret0 => return self.ret(false),

            Opcode::Field { recv, field, dst } => self.read_field(*recv, *field, *dst, false)?,
            Opcode::FieldRetain { recv, field, dst } => self.read_field(*recv, *field, *dst, true)?,
            Opcode::SetField { recv, field, right } => {
                self.write_field(*recv, *field, *right, FieldWrite::Plain)?
            }
            Opcode::SetFieldRelease { recv, field, right } => {
                self.write_field(*recv, *field, *right, FieldWrite::Release)?
            }
            Opcode::SetCheckFieldRelease { recv, field, right } => {
                self.write_field(*recv, *field, *right, FieldWrite::Checked)?
            }

            Opcode::Lambda { func, dst } => {
                let f = self.func_ref(chunk, *func)?;
                let v = self.heap.alloc_pool_object(TYPE_LAMBDA, ObjectData::Lambda(f))?;
                self.set_local(*dst, v);
            }
            Opcode::Closure {
                func,
                closure_local,
                captured,
                dst,
            } => {
                let f = self.func_ref(chunk, *func)?;
                let mut boxes = Vec::with_capacity(captured.len());
                for l in captured {
                    let v = self.local(*l);
                    self.heap.retain(v)?;
                    boxes.push(v);
                }
                let data = ClosureData {
                    func: f,
                    closure_local: *closure_local,
                    captured: ObjectFields::from_vec(boxes),
                };
                let v = self.heap.alloc(TYPE_CLOSURE, ObjectData::Closure(data))?;
                self.set_local(*dst, v);
            }

            Opcode::Compare { left, right, dst } => {
                let eq = self.values_equal(self.local(*left), self.local(*right));
                self.set_local(*dst, Value::Bool(eq));
            }
            Opcode::CompareNot { left, right, dst } => {
                let eq = self.values_equal(self.local(*left), self.local(*right));
                self.set_local(*dst, Value::Bool(!eq));
            }
            Opcode::LessFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Bool(a < b));
            }
            Opcode::GreaterFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Bool(a > b));
            }
            Opcode::LessEqualFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Bool(a <= b));
            }
            Opcode::GreaterEqualFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Bool(a >= b));
            }
            Opcode::LessInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Bool(a < b));
            }
            Opcode::GreaterInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Bool(a > b));
            }
            Opcode::LessEqualInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Bool(a <= b));
            }
            Opcode::GreaterEqualInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Bool(a >= b));
            }

            Opcode::AddFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a + b));
            }
            Opcode::SubFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a - b));
            }
            Opcode::MulFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a * b));
            }
            Opcode::DivFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a / b));
            }
            Opcode::PowFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a.powf(b)));
            }
            Opcode::ModFloat { left, right, dst } => {
                let (a, b) = self.floats(*left, *right)?;
                self.set_local(*dst, Value::Float(a % b));
            }
            Opcode::NegFloat { src, dst } => {
                let a = self.float(*src)?;
                self.set_local(*dst, Value::Float(-a));
            }
            Opcode::AddInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a.wrapping_add(b)));
            }
            Opcode::SubInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a.wrapping_sub(b)));
            }
            Opcode::MulInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a.wrapping_mul(b)));
            }
            Opcode::DivInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                if b == 0 {
                    return Err(self.division_by_zero());
                }
                self.set_local(*dst, Value::Integer(a.wrapping_div(b)));
            }
            Opcode::PowInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                if b < 0 {
                    return Err(self.throw_invalid_argument());
                }
                let exp = u32::try_from(b).unwrap_or(u32::MAX);
                self.set_local(*dst, Value::Integer(a.wrapping_pow(exp)));
            }
            Opcode::ModInt { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                if b == 0 {
                    return Err(self.division_by_zero());
                }
                self.set_local(*dst, Value::Integer(a.wrapping_rem(b)));
            }
            Opcode::NegInt { src, dst } => {
                let a = self.int(*src)?;
                self.set_local(*dst, Value::Integer(a.wrapping_neg()));
            }

            Opcode::StringTemplate {
                start,
                num_exprs,
                strs,
                dst,
            } => {
                let exprs = self.window(*start, *num_exprs as usize)?.to_vec();
                let mut out = String::new();
                for (i, idx) in strs.iter().enumerate() {
                    let part = chunk
                        .constant(*idx)
                        .and_then(|c| chunk.str_of(c))
                        .ok_or(Interrupt::msg("Template part is not a string constant."))?;
                    out.push_str(part);
                    if let Some(v) = exprs.get(i) {
                        out.push_str(&self.value_to_string(*v));
                    }
                }
                let s = self.heap.alloc_string(&out)?;
                self.set_local(*dst, s);
            }
            Opcode::Init { start, count } => {
                let base = self.slot(*start);
                self.exec
                    .stack
                    .get_mut(base..base + *count as usize)
                    .ok_or(Interrupt::msg("Local window out of range."))?
                    .fill(Value::None);
            }
            Opcode::ObjectSmall {
                type_id,
                start,
                num_fields,
                dst,
            }
            | Opcode::Object {
                type_id,
                start,
                num_fields,
                dst,
            } => {
                let fields = self.window(*start, *num_fields as usize)?.to_vec();
                let v = self.heap.alloc_object(*type_id, fields)?;
                self.set_local(*dst, v);
            }

            Opcode::PushTry { err_dst, catch_pc } => {
                let tf = TryFrame {
                    fp: self.exec.fp,
                    frame_depth: self.exec.frames.len() as u32,
                    catch_pc: *catch_pc,
                    err_dst: *err_dst,
                };
                self.exec.try_frames.push(tf);
            }
            Opcode::PopTry { jump_to } => {
                self.exec.try_frames.pop();
                self.exec.pc = *jump_to;
                return Ok(Flow::Next);
            }
            Opcode::Throw { err } => {
                let v = self.take_local(*err);
                self.throw_from_native = false;
                return Err(Interrupt::Throw(v));
            }

            Opcode::Coinit {
                start_args,
                num_args,
                body_pc,
                jump_to,
                dst,
                ..
            } => {
                self.coinit(*start_args, *num_args, *body_pc, *jump_to, *dst)?;
                return Ok(Flow::Next);
            }
            Opcode::Coyield { src } => {
                self.coyield(*src)?;
                return Ok(Flow::Next);
            }
            Opcode::Coresume { fiber, dst } => {
                self.coresume(*fiber, *dst)?;
                return Ok(Flow::Next);
            }
            Opcode::Coreturn => {
                self.coreturn()?;
                return Ok(Flow::Next);
            }

            Opcode::Box { src, dst } => {
                let v = self.local(*src);
                let b = self.heap.alloc_box(v)?;
                self.set_local(*dst, b);
            }
            Opcode::SetBoxValue { boxed, right } => {
                let id = self.box_id(*boxed)?;
                let v = self.local(*right);
                self.heap.set_box_value(id, v)?;
            }
            Opcode::SetBoxValueRelease { boxed, right } => {
                let id = self.box_id(*boxed)?;
                let v = self.local(*right);
                let old = self.heap.set_box_value(id, v)?;
                self.heap.release(old)?;
            }
            Opcode::BoxValue { boxed, dst } => {
                let id = self.box_id(*boxed)?;
                let v = self.heap.box_value(id)?;
                self.set_local(*dst, v);
            }
            Opcode::BoxValueRetain { boxed, dst } => {
                let id = self.box_id(*boxed)?;
                let v = self.heap.box_value(id)?;
                self.heap.retain(v)?;
                self.set_local(*dst, v);
            }
            Opcode::Captured {
                closure_local,
                idx,
                dst,
            } => {
                let v = match self.local(*closure_local) {
                    Value::Heap(id) => match &self.heap.get(id)?.data {
                        ObjectData::Closure(c) => c.captured.as_slice().get(*idx as usize).copied(),
                        _ => None,
                    },
                    _ => None,
                }
                .ok_or(Interrupt::msg("Captured variable out of range."))?;
                self.heap.retain(v)?;
                self.set_local(*dst, v);
            }

            Opcode::Tag { enum_id, member, dst } => self.set_local(
                *dst,
                Value::Enum {
                    enum_id: *enum_id,
                    member: *member,
                },
            ),
            Opcode::TagLiteral { sym, dst } => self.set_local(*dst, Value::Symbol(*sym)),
            Opcode::Cast { src, type_id, dst } => {
                let v = self.local(*src);
                let from = self.heap.type_id_of(v)?;
                if !self.cast_ok(from, *type_id) {
                    return Err(Interrupt::Panic(Panic::Msg(format!(
                        "Can not cast `{}` to `{}`.",
                        self.type_name(from),
                        self.type_name(*type_id)
                    ))));
                }
                self.set_local(*dst, v);
            }
            Opcode::CastAbstract { src, sema, dst } => {
                let v = self.local(*src);
                let from = self.heap.type_id_of(v)?;
                if !self.satisfies(from, *sema) {
                    return Err(Interrupt::Panic(Panic::Msg(format!(
                        "Can not cast `{}` to `{}`.",
                        self.type_name(from),
                        self.sema_name(*sema)
                    ))));
                }
                self.set_local(*dst, v);
            }

            Opcode::BitwiseAnd { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a & b));
            }
            Opcode::BitwiseOr { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a | b));
            }
            Opcode::BitwiseXor { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a ^ b));
            }
            Opcode::BitwiseNot { src, dst } => {
                let a = self.int(*src)?;
                self.set_local(*dst, Value::Integer(!a));
            }
            Opcode::BitwiseLeftShift { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a.wrapping_shl((b & 63) as u32)));
            }
            Opcode::BitwiseRightShift { left, right, dst } => {
                let (a, b) = self.ints(*left, *right)?;
                self.set_local(*dst, Value::Integer(a.wrapping_shr((b & 63) as u32)));
            }

            Opcode::ForRangeInit {
                start,
                end,
                step,
                counter,
                user_counter,
                reverse,
                exit,
            } => {
                let (s, e) = self.ints(*start, *end)?;
                let st = self.int(*step)?;
                if st <= 0 {
                    return Err(self.throw_invalid_argument());
                }
                let enter = if *reverse { s > e } else { s < e };
                if !enter {
                    self.exec.pc = *exit;
                    return Ok(Flow::Next);
                }
                self.set_local(*counter, Value::Integer(s));
                self.set_local(*user_counter, Value::Integer(s));
            }
            Opcode::ForRange {
                counter,
                step,
                end,
                user_counter,
                body,
            } => {
                let (c, st) = self.ints(*counter, *step)?;
                let e = self.int(*end)?;
                if let Some(n) = c.checked_add(st).filter(|n| *n < e) {
                    self.set_local(*counter, Value::Integer(n));
                    self.set_local(*user_counter, Value::Integer(n));
                    self.exec.pc = *body;
                    return Ok(Flow::Next);
                }
            }
            Opcode::ForRangeReverse {
                counter,
                step,
                end,
                user_counter,
                body,
            } => {
                let (c, st) = self.ints(*counter, *step)?;
                let e = self.int(*end)?;
                if let Some(n) = c.checked_sub(st).filter(|n| *n > e) {
                    self.set_local(*counter, Value::Integer(n));
                    self.set_local(*user_counter, Value::Integer(n));
                    self.exec.pc = *body;
                    return Ok(Flow::Next);
                }
            }
            Opcode::Match { expr, cases, else_pc } => {
                let v = self.local(*expr);
                let target = cases
                    .iter()
                    .find(|c| chunk.constant(c.constant).is_some_and(|k| self.values_equal(v, k)))
                    .map_or(*else_pc, |c| c.target);
                self.exec.pc = target;
                return Ok(Flow::Next);
            }

            Opcode::StaticFunc { func, dst } => {
                let v = self.static_func_value(*func)?;
                self.set_local(*dst, v);
            }
            Opcode::StaticVar { var, dst } => {
                let v = self
                    .static_vars
                    .get(*var as usize)
                    .copied()
                    .ok_or(Interrupt::msg("Unknown static variable."))?;
                self.heap.retain(v)?;
                self.set_local(*dst, v);
            }
            Opcode::SetStaticVar { var, src } => {
                let v = self.local(*src);
                let slot = self
                    .static_vars
                    .get_mut(*var as usize)
                    .ok_or(Interrupt::msg("Unknown static variable."))?;
                let old = std::mem::replace(slot, v);
                self.heap.release(old)?;
            }
            Opcode::SetStaticFunc { func, src } => self.set_static_func(*func, *src)?,
            Opcode::Sym { type_id, dst } => {
                let v = self
                    .heap
                    .alloc_pool_object(TYPE_METATYPE, ObjectData::MetaType(*type_id))?;
                self.set_local(*dst, v);
            }
            Opcode::End => {
                self.release_set_at(pc)?;
                return Ok(Flow::End);
            }
        }
        self.exec.pc = pc + 1;
        Ok(Flow::Next)
    }

    /// Owned function value for a function symbol's current binding
    fn static_func_value(&mut self, func: u32) -> Result<Value, Interrupt> {
        let binding = self
            .symbols
            .func(func)
            .map(|s| s.binding)
            .ok_or(Interrupt::msg("Unknown function symbol."))?;
        Ok(match binding {
            FuncBinding::Value(v) => {
                self.heap.retain(v)?;
                v
            }
            FuncBinding::Target(FuncTarget::Func(f)) => {
                self.heap.alloc_pool_object(TYPE_LAMBDA, ObjectData::Lambda(f))?
            }
            FuncBinding::Target(FuncTarget::Native {
                native,
                num_params,
                sig,
            }) => self.heap.alloc_pool_object(
                TYPE_NATIVE_FUNC,
                ObjectData::NativeFunc(NativeFuncData {
                    native,
                    num_params,
                    sig,
                }),
            )?,
        })
    }

    /// Signature id of a function value
    fn func_value_sig(&self, v: Value) -> Result<Option<u32>, Interrupt> {
        let Value::Heap(id) = v else {
            return Ok(None);
        };
        Ok(match &self.heap.get(id)?.data {
            ObjectData::Lambda(f) => Some(f.sig),
            ObjectData::Closure(c) => Some(c.func.sig),
            ObjectData::NativeFunc(n) => Some(n.sig),
            _ => None,
        })
    }

    /// `SetStaticFunc`: rebind a function symbol to a compatible function value
    fn set_static_func(&mut self, func: u32, src: Local) -> Result<(), Interrupt> {
        let v = self.local(src);
        let (name, declared) = self
            .symbols
            .func(func)
            .map(|s| (s.name.clone(), s.sig))
            .ok_or(Interrupt::msg("Unknown function symbol."))?;
        let compatible = match self.func_value_sig(v)? {
            Some(sig) => sig == declared || self.symbols.sig(sig) == self.symbols.sig(declared),
            None => false,
        };
        if !compatible {
            return Err(Interrupt::Panic(Panic::Msg(format!(
                "Assigning to static function `{name}` with a different function signature."
            ))));
        }
        self.heap.retain(v)?;
        if let Some(FuncBinding::Value(old)) = self.symbols.rebind(func, FuncBinding::Value(v)) {
            self.heap.release(old)?;
        }
        debug!(func = %name, "static function rebound");
        Ok(())
    }
}

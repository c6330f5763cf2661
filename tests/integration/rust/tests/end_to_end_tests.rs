//! End-to-End Tests
//!
//! Whole programs combining fibers, closures, natives and host re-entry.

use bytecode_system::{BytecodeChunk, Opcode};
use core_types::{ResultCode, Value};
use integration_tests::{declare_func, declare_native};
use interpreter::{Interrupt, Vm};
use memory_manager::FiberState;

fn apply(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    vm.call_value(args[0], &[args[1]])
}

fn vm_with_apply() -> Vm {
    let mut vm = Vm::default();
    vm.register_native("apply", 2, apply);
    vm
}

/// Test: a generator fiber yields squares to a summing loop
#[test]
fn test_fiber_generator_of_squares() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 6;
    chunk.emit(Opcode::Coinit { start_args: 1, num_args: 0, body_pc: 1, jump_to: 9, stack_size: 8, dst: 1 });
    // fiber: for i in 1..5 { yield i * i }
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 2 });
    chunk.emit(Opcode::ConstI8 { val: 5, dst: 3 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 4 });
    chunk.emit(Opcode::ForRangeInit { start: 2, end: 3, step: 4, counter: 5, user_counter: 6, reverse: false, exit: 8 });
    chunk.emit(Opcode::MulInt { left: 6, right: 6, dst: 7 });
    chunk.emit(Opcode::Coyield { src: 7 });
    chunk.emit(Opcode::ForRange { counter: 5, step: 4, end: 3, user_counter: 6, body: 5 });
    chunk.emit(Opcode::Coreturn);
    // main
    chunk.emit(Opcode::ConstI8 { val: 0, dst: 2 });
    for _ in 0..4 {
        chunk.emit(Opcode::Coresume { fiber: 1, dst: 3 });
        chunk.emit(Opcode::AddInt { left: 2, right: 3, dst: 2 });
    }
    chunk.emit(Opcode::Coresume { fiber: 1, dst: 4 });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(2), Value::Integer(30));
    assert_eq!(vm.local(4), Value::None);
    assert_eq!(vm.fiber_state(vm.local(1)), Some(FiberState::Done));
}

/// Test: a closure counter keeps its state in a captured box
#[test]
fn test_closure_counter() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 6;
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 0, num_ret: 1, func: 0 });
    for dst in 2..=4 {
        chunk.emit(Opcode::CopyRetainSrc { src: 1, dst });
        chunk.emit(Opcode::Call { start_local: dst, num_args: 0, num_ret: 1 });
    }
    chunk.emit(Opcode::Release { local: 1 });
    chunk.emit(Opcode::End);

    let make = chunk.next_pc();
    chunk.emit(Opcode::ConstI8 { val: 0, dst: 1 });
    chunk.emit(Opcode::Box { src: 1, dst: 2 });
    chunk.emit(Opcode::Closure { func: 1, closure_local: 1, captured: vec![2], dst: 0 });
    chunk.emit(Opcode::Release { local: 2 });
    chunk.emit(Opcode::Ret1);
    declare_func(&mut chunk, "make_counter", make, 0, 3);

    let inc = chunk.next_pc();
    chunk.emit(Opcode::Captured { closure_local: 1, idx: 0, dst: 2 });
    chunk.emit(Opcode::BoxValue { boxed: 2, dst: 3 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 4 });
    chunk.emit(Opcode::AddInt { left: 3, right: 4, dst: 3 });
    chunk.emit(Opcode::SetBoxValue { boxed: 2, right: 3 });
    chunk.emit(Opcode::Release { local: 2 });
    chunk.emit(Opcode::Copy { src: 3, dst: 0 });
    chunk.emit(Opcode::Ret1);
    declare_func(&mut chunk, "inc", inc, 0, 5);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(2), Value::Integer(1));
    assert_eq!(vm.local(3), Value::Integer(2));
    assert_eq!(vm.local(4), Value::Integer(3));
    assert_eq!(vm.heap().live_count(), 0);
}

/// Test: list methods mutate through builtin natives
#[test]
fn test_list_methods() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 10;
    let append = chunk.method_sym("append");
    let len = chunk.method_sym("len");
    let remove = chunk.method_sym("remove");
    chunk.emit(Opcode::List { start: 1, len: 0, dst: 1 });
    for val in [5, 6] {
        chunk.emit(Opcode::CopyRetainSrc { src: 1, dst: 3 });
        chunk.emit(Opcode::ConstI8 { val, dst: 4 });
        chunk.emit(Opcode::CallObjSym { start_local: 2, num_args: 2, num_ret: 0, method: append });
    }
    chunk.emit(Opcode::CopyRetainSrc { src: 1, dst: 3 });
    chunk.emit(Opcode::CallObjSym { start_local: 2, num_args: 1, num_ret: 1, method: len });
    chunk.emit(Opcode::CopyRetainSrc { src: 1, dst: 6 });
    chunk.emit(Opcode::ConstI8 { val: 0, dst: 7 });
    chunk.emit(Opcode::CallObjSym { start_local: 5, num_args: 2, num_ret: 0, method: remove });
    chunk.emit(Opcode::ConstI8 { val: 0, dst: 8 });
    chunk.emit(Opcode::IndexList { recv: 1, index: 8, dst: 9 });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(2), Value::Integer(2));
    assert_eq!(vm.local(9), Value::Integer(6));
    let list = vm.local(1).as_heap().unwrap();
    assert_eq!(vm.heap().list(list).unwrap().len(), 1);
    assert_eq!(vm.heap().rc(list).unwrap(), 1);
}

/// Test: a native re-enters the VM to call a lambda
#[test]
fn test_native_calls_back_into_bytecode() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 5;
    let apply_sym = declare_native(&mut chunk, "apply", 2);
    chunk.emit(Opcode::Lambda { func: 0, dst: 1 });
    chunk.emit(Opcode::CopyRetainSrc { src: 1, dst: 3 });
    chunk.emit(Opcode::ConstI8 { val: 21, dst: 4 });
    chunk.emit(Opcode::CallSym { start_local: 2, num_args: 2, num_ret: 1, func: apply_sym });
    chunk.emit(Opcode::Release { local: 1 });
    chunk.emit(Opcode::End);
    let double = chunk.next_pc();
    chunk.emit(Opcode::AddInt { left: 1, right: 1, dst: 0 });
    chunk.emit(Opcode::Ret1);
    declare_func(&mut chunk, "double", double, 1, 2);

    let mut vm = vm_with_apply();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(2), Value::Integer(42));
    assert_eq!(vm.heap().live_count(), 0);
}

/// Test: yielding from inside a host call panics instead of suspending
#[test]
fn test_yield_across_host_call_panics() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    let apply_sym = declare_native(&mut chunk, "apply", 2);
    chunk.emit(Opcode::Coinit { start_args: 1, num_args: 0, body_pc: 1, jump_to: 6, stack_size: 5, dst: 1 });
    chunk.emit(Opcode::Lambda { func: 0, dst: 1 });
    chunk.emit(Opcode::CopyRetainSrc { src: 1, dst: 3 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 4 });
    chunk.emit(Opcode::CallSym { start_local: 2, num_args: 2, num_ret: 1, func: apply_sym });
    chunk.emit(Opcode::Coreturn);
    chunk.emit(Opcode::Coresume { fiber: 1, dst: 2 });
    chunk.emit(Opcode::End);
    let yielder = chunk.next_pc();
    chunk.emit(Opcode::Coyield { src: 1 });
    chunk.emit(Opcode::Ret1);
    declare_func(&mut chunk, "yielder", yielder, 1, 2);

    let mut vm = vm_with_apply();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Panic);
    let msg = vm.panic_payload().unwrap().panic.to_string();
    assert!(msg.contains("Cannot yield across a host call."), "{msg}");
}

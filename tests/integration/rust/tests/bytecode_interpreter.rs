//! Bytecode System and Interpreter Integration Tests
//!
//! Programs built with the chunk API, serialized, reloaded and executed.

use bytecode_system::{BytecodeChunk, Const, Opcode};
use core_types::{ResultCode, Value};
use integration_tests::{declare_func, declare_native};
use interpreter::Vm;

fn round_trip(chunk: &BytecodeChunk) -> BytecodeChunk {
    BytecodeChunk::from_json(&chunk.to_json().unwrap()).unwrap()
}

/// Test: a recursive function survives serialization
#[test]
fn test_recursive_factorial_from_json() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    chunk.emit(Opcode::ConstI8 { val: 10, dst: 2 });
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 1, num_ret: 1, func: 0 });
    chunk.emit(Opcode::End);
    // fact(n): if n <= 1 return 1 else return n * fact(n - 1)
    let body = chunk.next_pc();
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 2 });
    chunk.emit(Opcode::LessEqualInt { left: 1, right: 2, dst: 3 });
    chunk.emit(Opcode::JumpNotCond { cond: 3, target: body + 5 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 0 });
    chunk.emit(Opcode::Ret1);
    chunk.emit(Opcode::SubInt { left: 1, right: 2, dst: 5 });
    chunk.emit(Opcode::CallSym { start_local: 4, num_args: 1, num_ret: 1, func: 0 });
    chunk.emit(Opcode::MulInt { left: 1, right: 4, dst: 0 });
    chunk.emit(Opcode::Ret1);
    declare_func(&mut chunk, "fact", body, 1, 6);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(round_trip(&chunk)).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(1), Value::Integer(3_628_800));
}

/// Test: string constants and natives across the JSON boundary
#[test]
fn test_string_natives_from_json() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 6;
    declare_native(&mut chunk, "len", 1);
    declare_native(&mut chunk, "print", 1);
    let s = chunk.add_const(Const::String("héllo".into()));
    chunk.emit(Opcode::ConstOp { idx: s, dst: 2 });
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 1, num_ret: 1, func: 0 });
    chunk.emit(Opcode::ConstOp { idx: s, dst: 4 });
    chunk.emit(Opcode::CallSym { start_local: 3, num_args: 1, num_ret: 0, func: 1 });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(round_trip(&chunk)).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(1), Value::Integer(5));
    assert_eq!(vm.output().to_vec(), vec!["héllo".to_string()]);
}

/// Test: enum tags, symbols and match dispatch
#[test]
fn test_tags_and_match() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 4;
    let color = chunk.add_enum("Color", &["red", "green"]);
    let green = chunk.add_const(Const::Enum { enum_id: color, member: 1 });
    let red = chunk.add_const(Const::Enum { enum_id: color, member: 0 });
    chunk.emit(Opcode::Tag { enum_id: color, member: 1, dst: 1 });
    chunk.emit(Opcode::Match {
        expr: 1,
        cases: vec![
            bytecode_system::MatchCase { constant: red, target: 2 },
            bytecode_system::MatchCase { constant: green, target: 4 },
        ],
        else_pc: 6,
    });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 2 });
    chunk.emit(Opcode::Jump { target: 6 });
    chunk.emit(Opcode::ConstI8 { val: 2, dst: 2 });
    chunk.emit(Opcode::Jump { target: 6 });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(round_trip(&chunk)).unwrap(), ResultCode::Success);
    assert_eq!(vm.local(2), Value::Integer(2));
    assert_eq!(vm.value_to_string(vm.local(1)), "Color.green");
}

/// Test: an out-of-range jump is rejected at load
#[test]
fn test_invalid_jump_rejected() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::Jump { target: 99 });
    chunk.emit(Opcode::End);
    let mut vm = Vm::default();
    assert!(vm.load(chunk).is_err());
}

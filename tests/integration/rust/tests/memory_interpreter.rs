//! Memory Manager and Interpreter Integration Tests
//!
//! Verifies that programs keep the heap's reference counts balanced and
//! that leaks are reported at teardown.

use bytecode_system::{BytecodeChunk, Opcode};
use core_types::{ResultCode, Value};
use interpreter::{Vm, VmConfig};
use memory_manager::HeapConfig;

/// Test: balanced program leaves nothing alive and counters agree
#[test]
fn test_balanced_program_counters() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 6;
    chunk.emit(Opcode::ConstI8 { val: 3, dst: 1 });
    chunk.emit(Opcode::Box { src: 1, dst: 2 });
    chunk.emit(Opcode::CopyRetainSrc { src: 2, dst: 3 });
    chunk.emit(Opcode::List { start: 3, len: 1, dst: 4 });
    chunk.emit(Opcode::ReleaseN { locals: vec![2, 4] });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.heap().live_count(), 0);
    assert_eq!(vm.heap().counters().num_retains, 1);
}

/// Test: a self-referencing box is reported as a leak
#[test]
fn test_cycle_reported_at_deinit() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 4;
    chunk.emit(Opcode::None { dst: 1 });
    chunk.emit(Opcode::Box { src: 1, dst: 2 });
    chunk.emit(Opcode::CopyRetainSrc { src: 2, dst: 3 });
    chunk.emit(Opcode::SetBoxValue { boxed: 2, right: 3 });
    chunk.emit(Opcode::Release { local: 2 });
    chunk.emit(Opcode::End);

    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.heap().live_count(), 1);
    let report = vm.deinit().unwrap();
    assert_eq!(report.leaked.len(), 1);
    assert_eq!(report.groups, 1);
    assert_eq!(vm.heap().live_count(), 0);
    assert_eq!(vm.heap().counters().num_force_releases, 1);
}

/// Test: exhausting external memory ends the run with OutOfMemory
#[test]
fn test_out_of_memory_result() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 4;
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 1 });
    chunk.emit(Opcode::ConstI8 { val: 2, dst: 2 });
    chunk.emit(Opcode::List { start: 1, len: 2, dst: 3 });
    chunk.emit(Opcode::End);

    let heap = HeapConfig::default().with_max_external_bytes(0);
    let mut vm = Vm::new(VmConfig::default().with_heap(heap), Default::default());
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::OutOfMemory);
    assert_eq!(ResultCode::OutOfMemory.exit_code(), 3);
}

/// Test: release of a freed object is reported as a double free
#[test]
fn test_double_release_is_unknown_with_check_rc() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    chunk.emit(Opcode::MapEmpty { dst: 1 });
    chunk.emit(Opcode::Release { local: 1 });
    chunk.emit(Opcode::Release { local: 1 });
    chunk.emit(Opcode::End);

    let heap = HeapConfig::default().with_check_rc(true);
    let mut vm = Vm::new(VmConfig::default().with_heap(heap), Default::default());
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Unknown);
    let msg = vm.panic_payload().unwrap().panic.to_string();
    assert!(msg.starts_with("double free"), "{msg}");
}

/// Test: host-built values interoperate with bytecode
#[test]
fn test_host_values_into_program() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 4;
    chunk.emit(Opcode::End);
    let body = chunk.next_pc();
    chunk.emit(Opcode::IndexMap { recv: 1, index: 2, dst: 0 });
    chunk.emit(Opcode::ReleaseN { locals: vec![1, 2] });
    chunk.emit(Opcode::Ret1);
    integration_tests::declare_func(&mut chunk, "lookup", body, 2, 3);

    let mut vm = Vm::default();
    vm.eval(chunk).unwrap();
    let key = vm.alloc_string("k").unwrap();
    let map = vm.alloc_map(&[(key, Value::Integer(8))]).unwrap();
    let lookup_key = vm.alloc_string("k").unwrap();
    let found = vm.call_func_sym("lookup", &[map, lookup_key]).unwrap();
    assert_eq!(found, Value::Integer(8));
    vm.heap_mut().release(lookup_key).unwrap();
    vm.heap_mut().release(map).unwrap();
    vm.heap_mut().release(key).unwrap();
    assert_eq!(vm.heap().live_count(), 0);
}

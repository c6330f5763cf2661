//! Contract tests for interpreter API
//!
//! These tests pin the public surface hosts rely on: loading, result codes,
//! configuration, reload persistence and the cache primitives.

use bytecode_system::{BytecodeChunk, Const, FuncDecl, FuncEntry, FuncSig, Opcode};
use core_types::{ResultCode, Value};
use interpreter::{EvalConfig, InlineCache, NativeRegistry, Trace, Vm, VmConfig, VmError};

fn counter_program(init: i8) -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    let c = chunk.add_const(Const::Integer(init as i64));
    let var = chunk.add_static_var("count", Some(c));
    chunk.emit(Opcode::StaticVar { var, dst: 1 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 2 });
    chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 1 });
    chunk.emit(Opcode::SetStaticVar { var, src: 1 });
    chunk.emit(Opcode::End);
    chunk
}

/// Test Vm::default() holds no program
#[test]
fn test_vm_default_contract() {
    let mut vm = Vm::default();
    assert!(vm.panic_payload().is_none());
    assert_eq!(vm.last_result(), None);
    assert_eq!(vm.execute(), ResultCode::Unknown);
}

/// Test load rejects an empty program
#[test]
fn test_load_rejects_invalid_program() {
    let mut vm = Vm::default();
    let err = vm.load(BytecodeChunk::new()).unwrap_err();
    assert!(matches!(err, VmError::InvalidProgram(_)));
}

/// Test load rejects a function without a signature
#[test]
fn test_load_rejects_missing_signature() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::End);
    chunk.add_func(FuncDecl {
        name: "f".into(),
        pc: 0,
        num_params: 0,
        stack_size: 1,
        sig: 7,
    });
    let mut vm = Vm::default();
    assert!(vm.load(chunk).is_err());
}

/// Test execute returns Success and records it
#[test]
fn test_execute_success_contract() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::End);
    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
    assert_eq!(vm.last_result(), Some(ResultCode::Success));
    assert_eq!(ResultCode::Success.exit_code(), 0);
}

/// Test a panic is cleared by the next execution
#[test]
fn test_panic_payload_cleared_on_rerun() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 2;
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 1 });
    chunk.emit(Opcode::Throw { err: 1 });
    chunk.emit(Opcode::End);
    let mut vm = Vm::default();
    assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Panic);
    assert!(vm.panic_payload().is_some());

    let mut ok = BytecodeChunk::new();
    ok.emit(Opcode::End);
    assert_eq!(vm.eval(ok).unwrap(), ResultCode::Success);
    assert!(vm.panic_payload().is_none());
}

/// Test static variables are initialized from their constant
#[test]
fn test_static_var_contract() {
    let mut vm = Vm::default();
    assert_eq!(vm.eval(counter_program(4)).unwrap(), ResultCode::Success);
    assert_eq!(vm.static_var("count"), Some(Value::Integer(5)));
    assert_eq!(vm.static_var("missing"), None);
}

/// Test reload keeps statics by name and a plain load resets them
#[test]
fn test_reload_contract() {
    let reload = EvalConfig {
        reload: true,
        ..Default::default()
    };
    let mut vm = Vm::new(VmConfig::default(), reload);
    vm.eval(counter_program(0)).unwrap();
    vm.eval(counter_program(0)).unwrap();
    assert_eq!(vm.static_var("count"), Some(Value::Integer(2)));

    let mut fresh = Vm::default();
    fresh.eval(counter_program(0)).unwrap();
    fresh.eval(counter_program(0)).unwrap();
    assert_eq!(fresh.static_var("count"), Some(Value::Integer(1)));
}

/// Test deinit reports no leaks for a balanced program
#[test]
fn test_deinit_contract() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    chunk.emit(Opcode::MapEmpty { dst: 1 });
    chunk.emit(Opcode::Release { local: 1 });
    chunk.emit(Opcode::End);
    let mut vm = Vm::default();
    vm.eval(chunk).unwrap();
    let report = vm.deinit().unwrap();
    assert!(report.leaked.is_empty());
    assert_eq!(vm.heap().live_count(), 0);
}

/// Test deinit after a single run skips the cycle check
#[test]
fn test_deinit_single_run_contract() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 2;
    chunk.emit(Opcode::MapEmpty { dst: 1 });
    chunk.emit(Opcode::End);
    let single = EvalConfig {
        single_run: true,
        ..Default::default()
    };
    let mut vm = Vm::new(VmConfig::default(), single);
    vm.eval(chunk).unwrap();
    let report = vm.deinit().unwrap();
    assert!(report.leaked.is_empty());
    assert_eq!(vm.heap().live_count(), 0);
}

/// Test call_func_sym reports unknown names
#[test]
fn test_call_func_sym_contract() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::End);
    let body = chunk.next_pc();
    chunk.emit(Opcode::ConstI8 { val: 3, dst: 0 });
    chunk.emit(Opcode::Ret1);
    let sig = chunk.add_sig(FuncSig::untyped(0));
    let f = chunk.add_func(FuncDecl {
        name: "three".into(),
        pc: body,
        num_params: 0,
        stack_size: 1,
        sig,
    });
    chunk.add_func_sym("three", FuncEntry::Func(f));

    let mut vm = Vm::default();
    vm.eval(chunk).unwrap();
    assert_eq!(vm.call_func_sym("three", &[]).unwrap(), Value::Integer(3));
    let err = vm.call_func_sym("four", &[]).unwrap_err();
    assert_eq!(err.to_string(), "unknown function `four`");
}

/// Test the builtin registry contents
#[test]
fn test_native_registry_contract() {
    let reg = NativeRegistry::with_builtins();
    for name in ["print", "len", "append", "remove", "str"] {
        assert!(reg.lookup(name).is_some(), "{name}");
    }
    assert!(NativeRegistry::new().is_empty());
}

/// Test the single-entry cache guards on key and generation
#[test]
fn test_inline_cache_contract() {
    let mut cache: InlineCache<u32, u8> = InlineCache::default();
    assert!(!cache.is_specialized());
    assert_eq!(cache.lookup(1, 0), None);
    cache.update(1, 9, 0);
    assert_eq!(cache.lookup(1, 0), Some(9));
    assert_eq!(cache.lookup(2, 0), None);
    assert_eq!(cache.lookup(1, 1), None);
    assert!(cache.is_specialized());
}

/// Test the trace snapshot serializes
#[test]
fn test_trace_serializes() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::End);
    let mut vm = Vm::new(VmConfig::default().with_trace(true), EvalConfig::default());
    vm.eval(chunk).unwrap();
    let trace: Trace = vm.trace();
    let json = serde_json::to_value(&trace).unwrap();
    assert_eq!(json["total_ops"], 1);
}

/// Test host allocation helpers produce owned values
#[test]
fn test_host_alloc_contract() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::End);
    let mut vm = Vm::default();
    vm.eval(chunk).unwrap();

    let s = vm.alloc_string("hi").unwrap();
    let list = vm.alloc_list(vec![Value::Integer(1), s]).unwrap();
    let first = vm.get_index(list, Value::Integer(0)).unwrap();
    assert_eq!(first, Value::Integer(1));
    vm.set_index(list, Value::Integer(0), Value::Integer(5)).unwrap();
    assert_eq!(vm.get_index(list, Value::Integer(0)).unwrap(), Value::Integer(5));
    assert_eq!(vm.value_to_string(list), "List (2)");
    vm.heap_mut().release(list).unwrap();
    assert_eq!(vm.heap().live_count(), 0);
}

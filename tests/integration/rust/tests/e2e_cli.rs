//! End-to-end CLI tests
//!
//! Writes programs to temporary files and runs them through the CLI runtime
//! with the configurations the flags select.

use std::path::PathBuf;

use bytecode_system::{BytecodeChunk, Const, Opcode};
use clap::Parser;
use core_types::ResultCode;
use tempfile::TempDir;
use vm_cli::{Cli, Command, RunArgs, Runtime};

fn parse_run(args: &[&str]) -> RunArgs {
    match Cli::try_parse_from(args).unwrap().command {
        Command::Run(run) => run,
    }
}

fn write(dir: &TempDir, name: &str, chunk: &BytecodeChunk) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, chunk.to_json().unwrap()).unwrap();
    path
}

fn counter() -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 3;
    let zero = chunk.add_const(Const::Integer(0));
    let var = chunk.add_static_var("runs", Some(zero));
    chunk.emit(Opcode::StaticVar { var, dst: 1 });
    chunk.emit(Opcode::ConstI8 { val: 1, dst: 2 });
    chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 1 });
    chunk.emit(Opcode::SetStaticVar { var, src: 1 });
    chunk.emit(Opcode::End);
    chunk
}

/// Test: --reload keeps statics between runs of one runtime
#[test]
fn test_reload_flag_persists_statics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "counter.json", &counter());
    let args = parse_run(&["corten-vm", "run", path.to_str().unwrap(), "--reload"]);
    let mut rt = Runtime::new(args.vm_config(), args.eval_config());
    for _ in 0..3 {
        assert_eq!(rt.run_file(&args.program).unwrap().code, ResultCode::Success);
    }
    assert_eq!(rt.vm().static_var("runs"), Some(core_types::Value::Integer(3)));
    assert_eq!(rt.finish().unwrap(), 0);
}

/// Test: without --reload every run starts from the initializers
#[test]
fn test_no_reload_resets_statics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "counter.json", &counter());
    let args = parse_run(&["corten-vm", "run", path.to_str().unwrap()]);
    let mut rt = Runtime::new(args.vm_config(), args.eval_config());
    rt.run_file(&args.program).unwrap();
    rt.run_file(&args.program).unwrap();
    assert_eq!(rt.vm().static_var("runs"), Some(core_types::Value::Integer(1)));
}

/// Test: --max-stack bounds recursion
#[test]
fn test_max_stack_flag() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 2;
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 0, num_ret: 1, func: 0 });
    chunk.emit(Opcode::End);
    let body = chunk.next_pc();
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 0, num_ret: 1, func: 0 });
    chunk.emit(Opcode::Ret1);
    integration_tests::declare_func(&mut chunk, "deep", body, 0, 2);

    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "deep.json", &chunk);
    let args = parse_run(&["corten-vm", "run", path.to_str().unwrap(), "--max-stack", "2048", "--single-run"]);
    let mut rt = Runtime::new(args.vm_config(), args.eval_config());
    let report = rt.run_file(&args.program).unwrap();
    assert_eq!(report.exit_code(), 2);
    assert_eq!(rt.finish().unwrap(), 0);
}

/// Test: the panic report lists one line per unwound frame
#[test]
fn test_panic_report_lists_frames() {
    let mut chunk = BytecodeChunk::new();
    chunk.main_stack_size = 2;
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 0, num_ret: 0, func: 0 });
    chunk.emit(Opcode::End);
    let body = chunk.next_pc();
    chunk.emit(Opcode::ConstI8 { val: 0, dst: 1 });
    chunk.emit(Opcode::DivInt { left: 1, right: 1, dst: 1 });
    chunk.emit(Opcode::Ret0);
    integration_tests::declare_func(&mut chunk, "divide", body, 0, 2);

    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "panic.json", &chunk);
    let args = parse_run(&["corten-vm", "run", path.to_str().unwrap(), "--gen-all-debug-syms"]);
    let mut rt = Runtime::new(args.vm_config(), args.eval_config());
    let report = rt.run_file(&args.program).unwrap();
    assert_eq!(report.exit_code(), 1);
    let text = report.panic.unwrap();
    assert!(text.starts_with("panic: uncaught error: error.DivisionByZero"), "{text}");
    assert_eq!(text.matches("  at ").count(), 2, "{text}");
}

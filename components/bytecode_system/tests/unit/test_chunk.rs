//! Tests for BytecodeChunk

use bytecode_system::*;
use core_types::{SourcePosition, Value, SEMA_TYPE_INTEGER};

fn pos(line: u32) -> SourcePosition {
    SourcePosition { line, column: 1, offset: 0 }
}

#[test]
fn test_emit_returns_sequential_pcs() {
    let mut chunk = BytecodeChunk::new();
    assert_eq!(chunk.emit(Opcode::True { dst: 0 }), 0);
    assert_eq!(chunk.emit(Opcode::End), 1);
    assert_eq!(chunk.next_pc(), 2);
}

#[test]
fn test_patch_forward_jump() {
    let mut chunk = BytecodeChunk::new();
    let jump = chunk.emit(Opcode::Jump { target: 0 });
    chunk.emit(Opcode::None { dst: 1 });
    let end = chunk.emit(Opcode::End);
    chunk.patch(jump, Opcode::Jump { target: end });
    assert_eq!(chunk.instructions[0], Opcode::Jump { target: 2 });
    assert!(chunk.validate().is_ok());
}

#[test]
fn test_constants_resolve_to_values() {
    let mut chunk = BytecodeChunk::new();
    let i = chunk.add_const(Const::Integer(40));
    let f = chunk.add_const(Const::Float(1.25));
    let e = chunk.add_const(Const::Error(2));
    assert_eq!(chunk.constant(i), Some(Value::Integer(40)));
    assert_eq!(chunk.constant(f), Some(Value::Float(1.25)));
    assert_eq!(chunk.constant(e), Some(Value::Error(2)));
    assert_eq!(chunk.constant(99), None);
}

#[test]
fn test_emit_with_position_records_debug_sym() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::True { dst: 0 });
    let pc = chunk.emit_with_position(Opcode::Throw { err: 0 }, pos(12), Some(0));
    let sym = chunk.debug.lookup_exact(pc).unwrap();
    assert_eq!(sym.pos.line, 12);
    assert_eq!(sym.func, Some(0));
}

#[test]
fn test_type_registration_interns_fields() {
    let mut chunk = BytecodeChunk::new();
    let tid = chunk.add_type(
        "Point",
        vec![
            FieldDecl { name: "x".into(), sema: SEMA_TYPE_INTEGER },
            FieldDecl { name: "y".into(), sema: SEMA_TYPE_INTEGER },
        ],
    );
    assert_eq!(chunk.type_decl(tid).map(|t| t.name.as_str()), Some("Point"));
    assert_eq!(chunk.field_sym("y"), 1);
    assert_eq!(chunk.field_names.len(), 2);
}

#[test]
fn test_signatures_are_deduplicated() {
    let mut chunk = BytecodeChunk::new();
    let a = chunk.add_sig(FuncSig::untyped(2));
    let b = chunk.add_sig(FuncSig::untyped(2));
    let c = chunk.add_sig(FuncSig::untyped(1));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_validate_rejects_unknown_function_symbol() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::CallSym { start_local: 1, num_args: 0, num_ret: 1, func: 3 });
    chunk.emit(Opcode::End);
    let err = chunk.validate().unwrap_err();
    assert!(matches!(err, ChunkError::UnknownRef { table: "function symbol", id: 3, .. }));
}

#[test]
fn test_validate_rejects_bad_constant() {
    let mut chunk = BytecodeChunk::new();
    chunk.emit(Opcode::ConstOp { idx: 0, dst: 1 });
    chunk.emit(Opcode::End);
    assert!(matches!(chunk.validate(), Err(ChunkError::ConstantOutOfRange { idx: 0, .. })));
}

#[test]
fn test_empty_chunk_is_invalid() {
    assert!(matches!(BytecodeChunk::new().validate(), Err(ChunkError::Empty)));
}

#[test]
fn test_from_json_minimal_program() {
    let json = r#"{
        "main_stack_size": 3,
        "constants": [{"Integer": 7}],
        "instructions": [
            {"ConstOp": {"idx": 0, "dst": 1}},
            "End"
        ],
        "release_table": {"1": [1]}
    }"#;
    let chunk = BytecodeChunk::from_json(json).unwrap();
    assert_eq!(chunk.main_stack_size, 3);
    assert_eq!(chunk.constant(0), Some(Value::Integer(7)));
    assert_eq!(chunk.release_set(1), &[1]);
}

#[test]
fn test_from_json_reports_syntax_errors() {
    assert!(matches!(BytecodeChunk::from_json("{"), Err(ChunkError::Json(_))));
}

//! Tests for the instruction set

use bytecode_system::*;

#[test]
fn test_match_targets_include_else() {
    let op = Opcode::Match {
        expr: 1,
        cases: vec![
            MatchCase { constant: 0, target: 4 },
            MatchCase { constant: 1, target: 6 },
        ],
        else_pc: 8,
    };
    assert_eq!(op.branch_targets(), vec![4, 6, 8]);
    assert_eq!(op.constant_refs(), vec![0, 1]);
}

#[test]
fn test_straight_line_ops_have_no_targets() {
    assert!(Opcode::AddFloat { left: 1, right: 2, dst: 3 }.branch_targets().is_empty());
    assert!(Opcode::Ret1.branch_targets().is_empty());
}

#[test]
fn test_try_targets() {
    assert_eq!(Opcode::PushTry { err_dst: 4, catch_pc: 10 }.branch_targets(), vec![10]);
    assert_eq!(Opcode::PopTry { jump_to: 12 }.branch_targets(), vec![12]);
}

#[test]
fn test_kind_names_serialize() {
    let json = serde_json::to_string(&OpKind::CallObjFuncIC).unwrap();
    assert_eq!(json, "\"CallObjFuncIC\"");
}

#[test]
fn test_null_local_is_max() {
    assert_eq!(NULL_LOCAL, u8::MAX);
}

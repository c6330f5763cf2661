//! Unit tests for source positions and frames

use core_types::{CompactFrame, RcCounters, SourcePosition, StackFrame};

#[test]
fn test_source_position_display() {
    let pos = SourcePosition { line: 7, column: 1, offset: 99 };
    assert_eq!(pos.to_string(), "7:1");
}

#[test]
fn test_stack_frame_display() {
    let frame = StackFrame {
        function_name: Some("inner".into()),
        source_url: Some("a.cy".into()),
        line: 3,
        column: 9,
        pc: 12,
    };
    assert_eq!(frame.to_string(), "inner (a.cy:3:9)");
}

#[test]
fn test_compact_frame_equality() {
    assert_eq!(CompactFrame { pc: 1, fp: 0 }, CompactFrame { pc: 1, fp: 0 });
    assert_ne!(CompactFrame { pc: 1, fp: 0 }, CompactFrame { pc: 1, fp: 4 });
}

#[test]
fn test_counter_balance() {
    let c = RcCounters {
        num_retains: 10,
        num_releases: 12,
        ..Default::default()
    };
    assert_eq!(c.balance(), -2);
    let json = serde_json::to_value(c).unwrap();
    assert_eq!(json["num_retains"], 10);
}

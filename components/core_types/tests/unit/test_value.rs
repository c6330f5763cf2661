//! Unit tests for Value and type ids

use core_types::*;

#[test]
fn test_default_value_is_none() {
    assert_eq!(Value::default(), Value::None);
    assert!(Value::default().is_none());
}

#[test]
fn test_immediates_have_type_ids() {
    let cases = [
        (Value::None, TYPE_NONE),
        (Value::Bool(true), TYPE_BOOLEAN),
        (Value::Integer(-7), TYPE_INTEGER),
        (Value::Float(0.5), TYPE_FLOAT),
        (Value::Symbol(3), TYPE_SYMBOL),
        (Value::Error(1), TYPE_ERROR),
        (Value::Enum { enum_id: 0, member: 2 }, TYPE_ENUM),
    ];
    for (value, expected) in cases {
        assert!(!value.is_heap());
        assert_eq!(value.immediate_type_id(), Some(expected), "{value:?}");
    }
}

#[test]
fn test_accessors_reject_other_variants() {
    assert_eq!(Value::Integer(5).as_integer(), Some(5));
    assert_eq!(Value::Float(5.0).as_integer(), None);
    assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
    assert_eq!(Value::Integer(1).as_static_str(), None);
    assert_eq!(Value::Bool(true).as_heap(), None);
}

#[test]
fn test_object_id_identity_includes_generation() {
    let a = ObjectId::new(4, 0);
    let b = ObjectId::new(4, 1);
    assert_ne!(Value::Heap(a), Value::Heap(b));
    assert_eq!(a.to_string(), "#4.0");
}

#[test]
fn test_value_json_shape() {
    let json = serde_json::to_string(&Value::Integer(3)).unwrap();
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Value::Integer(3));
}

#[test]
fn test_user_types_follow_builtins() {
    assert_eq!(FIRST_USER_TYPE_ID, TYPE_METATYPE + 1);
    assert_eq!(NUM_SEMA_TYPES, SEMA_TYPE_DYNAMIC + 1);
    assert!(!satisfies_builtin(FIRST_USER_TYPE_ID, SEMA_TYPE_LIST));
    assert!(satisfies_builtin(FIRST_USER_TYPE_ID, SEMA_TYPE_DYNAMIC));
}

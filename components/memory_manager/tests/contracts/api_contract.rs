//! Contract tests verifying the heap's ownership behaviour through its public API.

use core_types::{Value, TYPE_LIST};
use memory_manager::*;

fn list_of(heap: &mut Heap, items: Vec<Value>) -> Value {
    heap.alloc(TYPE_LIST, ObjectData::List(items)).unwrap()
}

/// Final rc equals retains issued minus releases issued.
#[test]
fn contract_refcount_conservation() {
    let mut heap = Heap::default();
    let v = heap.alloc_box(Value::Integer(1)).unwrap();
    let id = v.as_heap().unwrap();
    for _ in 0..5 {
        heap.retain(v).unwrap();
    }
    for _ in 0..3 {
        heap.release(v).unwrap();
    }
    assert_eq!(heap.rc(id).unwrap(), 1 + 5 - 3);
    heap.release(v).unwrap();
    heap.release(v).unwrap();
    assert!(!heap.is_live(id));
}

/// Releasing a list decrements each element exactly once.
#[test]
fn contract_list_release_decrements_children() {
    let mut heap = Heap::default();
    let shared = heap.alloc_box(Value::None).unwrap();
    heap.retain(shared).unwrap();
    let fresh = heap.alloc_string("fresh").unwrap();
    let list = list_of(&mut heap, vec![shared, fresh, Value::Integer(3)]);

    assert_eq!(heap.rc(shared.as_heap().unwrap()).unwrap(), 2);
    heap.release(list).unwrap();
    assert_eq!(heap.rc(shared.as_heap().unwrap()).unwrap(), 1);
    assert!(!heap.is_live(fresh.as_heap().unwrap()));
}

/// A freed object can never be read or retained again.
#[test]
fn contract_no_use_after_free() {
    let mut heap = Heap::new(HeapConfig::default().with_check_rc(true));
    let v = heap.alloc_string("x").unwrap();
    let id = v.as_heap().unwrap();
    heap.release(v).unwrap();
    assert!(heap.get(id).is_err());
    assert!(heap.str_of(v).is_none());
    assert_eq!(heap.retain(v), Err(HeapError::DanglingRetain(id)));
    assert_eq!(heap.release(v), Err(HeapError::DoubleFree(id)));
    assert!(heap.was_freed(id));
}

/// Immediates carry no ownership obligation.
#[test]
fn contract_immediates_ignored() {
    let mut heap = Heap::default();
    heap.retain(Value::Integer(4)).unwrap();
    heap.release(Value::Float(1.0)).unwrap();
    assert_eq!(heap.counters().num_retains, 0);
    assert_eq!(heap.counters().num_retain_attempts, 1);
    assert_eq!(heap.counters().num_release_attempts, 1);
}

#[test]
fn contract_map_keys_compare_by_content() {
    let mut heap = Heap::default();
    let statics = "keykey";
    let static_key = Value::StaticAstring(core_types::StrRef::new(0, 3));
    let heap_key = heap.alloc_string("key").unwrap();
    let map = heap.alloc_map(ValueMap::new()).unwrap().as_heap().unwrap();

    assert_eq!(heap.map_set(map, static_key, Value::Integer(1), statics).unwrap(), None);
    let old = heap.map_set(map, heap_key, Value::Integer(2), statics).unwrap();
    assert_eq!(old, Some(Value::Integer(1)));
    assert_eq!(heap.map_len(map).unwrap(), 1);
    // The existing key was kept, so the heap key was not retained.
    assert_eq!(heap.rc(heap_key.as_heap().unwrap()).unwrap(), 1);
    assert_eq!(
        heap.map_get(map, heap_key, statics).unwrap(),
        Some(Value::Integer(2))
    );
}

#[test]
fn contract_map_release_releases_keys_and_values() {
    let mut heap = Heap::default();
    let key = heap.alloc_string("k").unwrap();
    let value = heap.alloc_box(Value::None).unwrap();
    let map_v = heap.alloc_map(ValueMap::new()).unwrap();
    let map = map_v.as_heap().unwrap();
    heap.map_set(map, key, value, "").unwrap();
    // The local still owns `key`; the map retained its own reference.
    assert_eq!(heap.rc(key.as_heap().unwrap()).unwrap(), 2);
    heap.release(key).unwrap();
    heap.release(map_v).unwrap();
    assert_eq!(heap.live_count(), 0);
}

#[test]
fn contract_map_remove_transfers_ownership() {
    let mut heap = Heap::default();
    let map = heap.alloc_map(ValueMap::new()).unwrap().as_heap().unwrap();
    heap.map_set(map, Value::Integer(1), Value::Bool(true), "").unwrap();
    assert_eq!(
        heap.map_remove(map, Value::Integer(1), "").unwrap(),
        Some((Value::Integer(1), Value::Bool(true)))
    );
    assert_eq!(heap.map_remove(map, Value::Integer(1), "").unwrap(), None);
}

#[test]
fn contract_fiber_teardown_releases_owned_slots() {
    let mut heap = Heap::default();
    let arg = heap.alloc_string("arg").unwrap();
    let borrowed = heap.alloc_string("borrowed").unwrap();
    let stack = vec![Value::None, arg, borrowed];
    let fiber = heap
        .alloc_pool_object(
            core_types::TYPE_FIBER,
            ObjectData::Fiber(Box::new(FiberData::new(0, stack, vec![1]))),
        )
        .unwrap();
    heap.release(fiber).unwrap();
    assert!(!heap.is_live(arg.as_heap().unwrap()));
    assert!(heap.is_live(borrowed.as_heap().unwrap()));
}

#[test]
fn contract_list_push_accounts_growth() {
    let mut heap = Heap::new(HeapConfig::default().with_max_external_bytes(1 << 12));
    let list = list_of(&mut heap, Vec::new());
    let id = list.as_heap().unwrap();
    let before = heap.external_bytes();
    for n in 0..10 {
        heap.list_push(id, Value::Integer(n)).unwrap();
    }
    assert!(heap.external_bytes() > before);
    assert_eq!(heap.list(id).unwrap().len(), 10);
    heap.release(list).unwrap();
    assert_eq!(heap.external_bytes(), 0);
}

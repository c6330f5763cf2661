//! Native function registry and builtin natives.
//!
//! Natives receive their arguments borrowed; the VM releases the argument
//! window after the call returns. A native that stores an argument must
//! retain it first. The returned value is owned by the caller.

use std::collections::HashMap;

use core_types::{Value, TYPE_LIST, TYPE_MAP};
use memory_manager::ObjectData;

use crate::error::Interrupt;
use crate::vm::Vm;

/// Host function signature
pub type NativeFn = fn(&mut Vm, &[Value]) -> Result<Value, Interrupt>;

/// A registered native
#[derive(Debug, Clone)]
pub struct NativeEntry {
    /// Registry name
    pub name: String,
    /// Parameter count, receiver included for methods
    pub num_params: u8,
    /// Entry point
    pub func: NativeFn,
}

/// Natives by name and index
#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    entries: Vec<NativeEntry>,
    by_name: HashMap<String, u32>,
}

impl NativeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin natives
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("print", 1, native_print);
        reg.register("len", 1, native_len);
        reg.register("append", 2, native_append);
        reg.register("remove", 2, native_remove);
        reg.register("str", 1, native_str);
        reg
    }

    /// Add or replace a native, returning its index
    pub fn register(&mut self, name: &str, num_params: u8, func: NativeFn) -> u32 {
        let entry = NativeEntry {
            name: name.to_string(),
            num_params,
            func,
        };
        if let Some(&idx) = self.by_name.get(name) {
            self.entries[idx as usize] = entry;
            return idx;
        }
        self.entries.push(entry);
        let idx = (self.entries.len() - 1) as u32;
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    /// Index of a native by name
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Native by index
    pub fn get(&self, idx: u32) -> Option<&NativeEntry> {
        self.entries.get(idx as usize)
    }

    /// Number of natives
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Argument `i`, or `error.InvalidArgument` when the call passed fewer
fn arg(vm: &Vm, args: &[Value], i: usize) -> Result<Value, Interrupt> {
    args.get(i).copied().ok_or_else(|| vm.throw_invalid_argument())
}

fn native_print(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    let line = vm.value_to_string(arg(vm, args, 0)?);
    vm.print_line(line);
    Ok(Value::None)
}

fn native_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    let s = vm.value_to_string(arg(vm, args, 0)?);
    Ok(vm.heap_mut().alloc_string(&s)?)
}

fn native_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    let v = arg(vm, args, 0)?;
    if let Some(s) = vm.str_of(v) {
        return Ok(Value::Integer(s.chars().count() as i64));
    }
    let Value::Heap(id) = v else {
        return Err(vm.throw_invalid_argument());
    };
    let len = match &vm.heap().get(id)?.data {
        ObjectData::List(items) => items.len(),
        ObjectData::Map(map) => map.len(),
        _ => return Err(vm.throw_invalid_argument()),
    };
    Ok(Value::Integer(len as i64))
}

fn native_append(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    let (list, item) = (arg(vm, args, 0)?, arg(vm, args, 1)?);
    match list {
        Value::Heap(id) if vm.heap().type_id_of(list)? == TYPE_LIST => {
            vm.heap_mut().retain(item)?;
            vm.heap_mut().list_push(id, item)?;
            Ok(Value::None)
        }
        _ => Err(vm.throw_invalid_argument()),
    }
}

fn native_remove(vm: &mut Vm, args: &[Value]) -> Result<Value, Interrupt> {
    let (recv, key) = (arg(vm, args, 0)?, arg(vm, args, 1)?);
    let Value::Heap(id) = recv else {
        return Err(vm.throw_invalid_argument());
    };
    match vm.heap().type_id_of(recv)? {
        TYPE_LIST => {
            let Value::Integer(idx) = key else {
                return Err(vm.throw_invalid_argument());
            };
            let len = vm.heap().list(id)?.len() as i64;
            let idx = if idx < 0 { idx + len } else { idx };
            if idx < 0 || idx >= len {
                return Err(vm.throw_out_of_bounds());
            }
            let removed = vm.heap_mut().list_mut(id)?.remove(idx as usize);
            vm.heap_mut().release(removed)?;
        }
        TYPE_MAP => {
            let chunk = vm.chunk_rc();
            if let Some((k, v)) = vm.heap_mut().map_remove(id, key, chunk.string_buffer())? {
                vm.heap_mut().release(k)?;
                vm.heap_mut().release(v)?;
            }
        }
        _ => return Err(vm.throw_invalid_argument()),
    }
    Ok(Value::None)
}

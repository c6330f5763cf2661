//! Indexing, slicing, field access and box cells.

use bytecode_system::{Local, OpKind};
use core_types::{ObjectId, Panic, TypeId, Value, TYPE_BOX, TYPE_LIST, TYPE_MAP};
use memory_manager::{ObjectData, ValueMap};

use crate::error::Interrupt;
use crate::inline_cache::FieldSlot;
use crate::vm::Vm;

/// Resolved receiver of a field access
enum FieldHost {
    Object(ObjectId, FieldSlot),
    Map(ObjectId),
}

/// How a field store treats the previous value and the declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldWrite {
    Plain,
    Release,
    Checked,
}

/// Normalize a possibly negative index against `len`
fn list_index(index: i64, len: usize) -> Option<usize> {
    let idx = if index < 0 {
        index.checked_add(len as i64)?
    } else {
        index
    };
    usize::try_from(idx).ok().filter(|i| *i < len)
}

impl Vm {
    /// Retained element of a list or map
    pub(crate) fn index_value(&mut self, recv: Value, index: Value) -> Result<Value, Interrupt> {
        let Value::Heap(id) = recv else {
            return Err(self.throw_invalid_argument());
        };
        let v = match self.heap.type_id_of(recv)? {
            TYPE_LIST => {
                let Value::Integer(i) = index else {
                    return Err(self.throw_invalid_argument());
                };
                let items = self.heap.list(id)?;
                match list_index(i, items.len()) {
                    Some(idx) => items[idx],
                    None => return Err(self.throw_out_of_bounds()),
                }
            }
            TYPE_MAP => {
                let chunk = self.chunk_rc();
                self.heap
                    .map_get(id, index, chunk.string_buffer())?
                    .unwrap_or_default()
            }
            _ => return Err(self.throw_invalid_argument()),
        };
        self.heap.retain(v)?;
        Ok(v)
    }

    /// Store into a list or map. `v` moves in.
    pub(crate) fn set_index_value(
        &mut self,
        recv: Value,
        index: Value,
        v: Value,
        release_old: bool,
    ) -> Result<(), Interrupt> {
        let Value::Heap(id) = recv else {
            return Err(self.throw_invalid_argument());
        };
        let old = match self.heap.type_id_of(recv)? {
            TYPE_LIST => {
                let Value::Integer(i) = index else {
                    return Err(self.throw_invalid_argument());
                };
                let items = self.heap.list_mut(id)?;
                match list_index(i, items.len()) {
                    Some(idx) => Some(std::mem::replace(&mut items[idx], v)),
                    None => return Err(self.throw_out_of_bounds()),
                }
            }
            TYPE_MAP => {
                let chunk = self.chunk_rc();
                self.heap.map_set(id, index, v, chunk.string_buffer())?
            }
            _ => return Err(self.throw_invalid_argument()),
        };
        if let (true, Some(old)) = (release_old, old) {
            self.heap.release(old)?;
        }
        Ok(())
    }

    /// `IndexList` / `IndexMap`
    pub(crate) fn index_op(&mut self, recv: Local, index: Local, dst: Local) -> Result<(), Interrupt> {
        let v = self.index_value(self.local(recv), self.local(index))?;
        self.set_local(dst, v);
        Ok(())
    }

    /// `SetIndex` / `SetIndexRelease`
    pub(crate) fn set_index_op(
        &mut self,
        recv: Local,
        index: Local,
        right: Local,
        release_old: bool,
    ) -> Result<(), Interrupt> {
        self.set_index_value(self.local(recv), self.local(index), self.local(right), release_old)
    }

    /// `SliceList`: `none` bounds stand for the list edges
    pub(crate) fn slice_list(&mut self, recv: Local, start: Local, end: Local, dst: Local) -> Result<(), Interrupt> {
        let list = self.local(recv);
        let Value::Heap(id) = list else {
            return Err(self.throw_invalid_argument());
        };
        if self.heap.type_id_of(list)? != TYPE_LIST {
            return Err(self.throw_invalid_argument());
        }
        let len = self.heap.list(id)?.len() as i64;
        let bound = |v: Value, default: i64| match v {
            Value::None => Some(default),
            Value::Integer(n) if n < 0 => Some(n + len),
            Value::Integer(n) => Some(n),
            _ => None,
        };
        let (Some(s), Some(e)) = (bound(self.local(start), 0), bound(self.local(end), len)) else {
            return Err(self.throw_invalid_argument());
        };
        if s < 0 || e > len || s > e {
            return Err(self.throw_out_of_bounds());
        }
        let items = self.heap.list(id)?[s as usize..e as usize].to_vec();
        for v in &items {
            self.heap.retain(*v)?;
        }
        let slice = self.heap.alloc(TYPE_LIST, ObjectData::List(items))?;
        self.set_local(dst, slice);
        Ok(())
    }

    /// `Map`: keys and values are moved out of consecutive locals
    pub(crate) fn build_map(&mut self, start: Local, num_entries: u8, dst: Local) -> Result<(), Interrupt> {
        let entries = self.window(start, num_entries as usize * 2)?.to_vec();
        let map = self.heap.alloc_map(ValueMap::new())?;
        let Value::Heap(id) = map else {
            return Err(Interrupt::msg("Map allocation returned an immediate."));
        };
        let chunk = self.chunk_rc();
        for pair in entries.chunks_exact(2) {
            if let Some(old) = self.heap.map_set(id, pair[0], pair[1], chunk.string_buffer())? {
                self.heap.release(old)?;
            }
            self.heap.release(pair[0])?;
        }
        self.set_local(dst, map);
        Ok(())
    }

    /// Borrowed view of `len` consecutive locals
    pub(crate) fn window(&self, start: Local, len: usize) -> Result<&[Value], Interrupt> {
        let base = self.slot(start);
        self.exec
            .stack
            .get(base..base + len)
            .ok_or(Interrupt::msg("Local window out of range."))
    }

    /// Storage slot of a named field of a user type
    pub(crate) fn lookup_field(&self, type_id: TypeId, field: u32) -> Option<FieldSlot> {
        let decl = self.chunk.type_decl(type_id)?;
        let name = self.chunk.field_names.get(field as usize)?;
        let offset = decl.fields.iter().position(|f| f.name == *name)?;
        Some(FieldSlot {
            offset: offset as u16,
            field_type: decl.fields[offset].sema,
        })
    }

    fn resolve_field(&mut self, recv: Value, field: u32, kind: OpKind, cached: Option<OpKind>) -> Result<FieldHost, Interrupt> {
        let pc = self.exec.pc;
        let missing = self.throw_error(self.symbols.errors().missing_field);
        let Value::Heap(id) = recv else {
            return Err(missing);
        };
        let type_id = self.heap.get(id)?.type_id;
        if type_id == TYPE_MAP {
            self.count(kind);
            return Ok(FieldHost::Map(id));
        }
        let generation = self.symbols.generation();
        if let Some(slot) = self.caches.field(pc, type_id, generation) {
            self.count(cached.unwrap_or(kind));
            return Ok(FieldHost::Object(id, slot));
        }
        self.count(kind);
        let slot = self.lookup_field(type_id, field).ok_or(missing)?;
        self.caches.set_field(pc, type_id, slot, generation);
        Ok(FieldHost::Object(id, slot))
    }

    fn field_key(&self, field: u32) -> Value {
        self.field_keys.get(field as usize).copied().unwrap_or_default()
    }

    /// `Field` / `FieldRetain`
    pub(crate) fn read_field(&mut self, recv: Local, field: u32, dst: Local, retain: bool) -> Result<(), Interrupt> {
        let (kind, cached) = if retain {
            (OpKind::FieldRetain, OpKind::FieldRetainIC)
        } else {
            (OpKind::Field, OpKind::FieldIC)
        };
        let v = self.field_value(self.local(recv), field, kind, Some(cached))?;
        if retain {
            self.heap.retain(v)?;
        }
        self.set_local(dst, v);
        Ok(())
    }

    /// Borrowed field value
    pub(crate) fn field_value(&mut self, recv: Value, field: u32, kind: OpKind, cached: Option<OpKind>) -> Result<Value, Interrupt> {
        let missing = self.throw_error(self.symbols.errors().missing_field);
        match self.resolve_field(recv, field, kind, cached)? {
            FieldHost::Object(id, slot) => match &self.heap.get(id)?.data {
                ObjectData::Object(fields) => fields.as_slice().get(slot.offset as usize).copied().ok_or(missing),
                _ => Err(missing),
            },
            FieldHost::Map(id) => {
                let chunk = self.chunk_rc();
                let key = self.field_key(field);
                Ok(self.heap.map_get(id, key, chunk.string_buffer())?.unwrap_or_default())
            }
        }
    }

    /// `SetField` / `SetFieldRelease` / `SetCheckFieldRelease`
    pub(crate) fn write_field(&mut self, recv: Local, field: u32, right: Local, mode: FieldWrite) -> Result<(), Interrupt> {
        let (kind, cached) = match mode {
            FieldWrite::Plain => (OpKind::SetField, None),
            FieldWrite::Release => (OpKind::SetFieldRelease, Some(OpKind::SetFieldReleaseIC)),
            FieldWrite::Checked => (OpKind::SetCheckFieldRelease, None),
        };
        let v = self.local(right);
        let missing = self.throw_error(self.symbols.errors().missing_field);
        let old = match self.resolve_field(self.local(recv), field, kind, cached)? {
            FieldHost::Object(id, slot) => {
                if mode == FieldWrite::Checked {
                    let type_id = self.heap.type_id_of(v)?;
                    if !self.satisfies(type_id, slot.field_type) {
                        let name = self.chunk.field_names.get(field as usize).cloned().unwrap_or_default();
                        return Err(Interrupt::Panic(Panic::Msg(format!(
                            "Assigning to `{}` field with incompatible type `{}`.",
                            name,
                            self.type_name(type_id)
                        ))));
                    }
                }
                match &mut self.heap.get_mut(id)?.data {
                    ObjectData::Object(fields) => fields
                        .as_mut_slice()
                        .get_mut(slot.offset as usize)
                        .map(|f| std::mem::replace(f, v))
                        .ok_or(missing)?,
                    _ => return Err(missing),
                }
            }
            FieldHost::Map(id) => {
                let chunk = self.chunk_rc();
                let key = self.field_key(field);
                self.heap
                    .map_set(id, key, v, chunk.string_buffer())?
                    .unwrap_or_default()
            }
        };
        if mode != FieldWrite::Plain {
            self.heap.release(old)?;
        }
        Ok(())
    }

    /// Heap handle of the box in local `l`
    pub(crate) fn box_id(&self, l: Local) -> Result<ObjectId, Interrupt> {
        let v = self.local(l);
        match v {
            Value::Heap(id) if self.heap.type_id_of(v)? == TYPE_BOX => Ok(id),
            _ => Err(Interrupt::msg("Expected a box.")),
        }
    }
}

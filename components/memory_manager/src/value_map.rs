//! Open-addressed hash map keyed by [`Value`].
//!
//! Robin Hood probing with backward-shift deletion. Each bucket stores the
//! full hash, so growth never needs to re-read key contents. Hashing and
//! key equality are supplied by the caller because string keys compare by
//! content, which lives outside the map.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use core_types::{ObjectId, Value, TYPE_MAP};

use crate::error::HeapError;
use crate::heap::Heap;
use crate::object::{ObjectData, VALUE_BYTES};

const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    hash: u64,
    /// Distance from the ideal slot
    dib: u32,
    key: Value,
    value: Value,
}

/// Robin Hood hash map from `Value` to `Value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    buckets: Vec<Option<Bucket>>,
    len: usize,
}

impl ValueMap {
    /// Empty map without storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry count
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bucket count
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Capacity after inserting one more entry
    pub fn capacity_after_insert(&self) -> usize {
        if self.buckets.is_empty() {
            MIN_CAPACITY
        } else if (self.len + 1) * 8 > self.buckets.len() * 7 {
            self.buckets.len() * 2
        } else {
            self.buckets.len()
        }
    }

    fn ideal(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn find(&self, hash: u64, eq: impl Fn(Value) -> bool) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let mask = self.buckets.len() - 1;
        let mut idx = self.ideal(hash);
        let mut dist = 0u32;
        loop {
            match &self.buckets[idx] {
                None => return None,
                Some(b) if b.dib < dist => return None,
                Some(b) if b.hash == hash && eq(b.key) => return Some(idx),
                Some(_) => {}
            }
            dist += 1;
            idx = (idx + 1) & mask;
        }
    }

    /// Look up the value for a key
    pub fn get(&self, hash: u64, eq: impl Fn(Value) -> bool) -> Option<Value> {
        self.find(hash, eq)
            .and_then(|idx| self.buckets[idx].map(|b| b.value))
    }

    /// Whether a key is present
    pub fn contains(&self, hash: u64, eq: impl Fn(Value) -> bool) -> bool {
        self.find(hash, eq).is_some()
    }

    /// Insert or overwrite. Returns the previous value when the key existed,
    /// in which case the stored key is kept.
    pub fn insert(
        &mut self,
        hash: u64,
        key: Value,
        value: Value,
        eq: impl Fn(Value) -> bool,
    ) -> Option<Value> {
        if let Some(idx) = self.find(hash, eq) {
            let bucket = self.buckets[idx].as_mut()?;
            return Some(std::mem::replace(&mut bucket.value, value));
        }
        let cap = self.capacity_after_insert();
        if cap != self.buckets.len() {
            self.resize(cap);
        }
        self.place(Bucket {
            hash,
            dib: 0,
            key,
            value,
        });
        self.len += 1;
        None
    }

    fn place(&mut self, mut incoming: Bucket) {
        let mask = self.buckets.len() - 1;
        let mut idx = self.ideal(incoming.hash);
        loop {
            match &mut self.buckets[idx] {
                slot @ None => {
                    *slot = Some(incoming);
                    return;
                }
                Some(resident) => {
                    if resident.dib < incoming.dib {
                        std::mem::swap(resident, &mut incoming);
                    }
                }
            }
            incoming.dib += 1;
            idx = (idx + 1) & mask;
        }
    }

    fn resize(&mut self, cap: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![None; cap]);
        for mut b in old.into_iter().flatten() {
            b.dib = 0;
            self.place(b);
        }
    }

    /// Remove a key, returning the stored key and value
    pub fn remove(&mut self, hash: u64, eq: impl Fn(Value) -> bool) -> Option<(Value, Value)> {
        let mut idx = self.find(hash, eq)?;
        let removed = self.buckets[idx].take()?;
        self.len -= 1;
        let mask = self.buckets.len() - 1;
        loop {
            let next = (idx + 1) & mask;
            match self.buckets[next] {
                Some(mut b) if b.dib > 0 => {
                    b.dib -= 1;
                    self.buckets[idx] = Some(b);
                    self.buckets[next] = None;
                    idx = next;
                }
                _ => break,
            }
        }
        Some((removed.key, removed.value))
    }

    /// Entries in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.buckets.iter().flatten().map(|b| (b.key, b.value))
    }

    /// Mutable access to the value of an existing key
    pub fn get_mut(&mut self, hash: u64, eq: impl Fn(Value) -> bool) -> Option<&mut Value> {
        let idx = self.find(hash, eq)?;
        self.buckets[idx].as_mut().map(|b| &mut b.value)
    }
}

/// Hashing and equality for map keys.
///
/// Strings, static or heap allocated, hash and compare by content. Other
/// heap objects compare by identity.
pub struct KeyContext<'a> {
    heap: &'a Heap,
    statics: &'a str,
}

impl<'a> KeyContext<'a> {
    /// Context reading heap strings from `heap` and static strings from `statics`
    pub fn new(heap: &'a Heap, statics: &'a str) -> Self {
        Self { heap, statics }
    }

    /// Text of a string key
    pub fn key_str(&self, v: Value) -> Option<&'a str> {
        match v {
            Value::StaticAstring(r) | Value::StaticUstring(r) => self.statics.get(r.range()),
            Value::Heap(_) => self.heap.str_of(v),
            _ => None,
        }
    }

    /// Hash of a key
    pub fn hash(&self, v: Value) -> u64 {
        let mut h = DefaultHasher::new();
        if let Some(s) = self.key_str(v) {
            0u8.hash(&mut h);
            s.hash(&mut h);
            return h.finish();
        }
        match v {
            Value::None => 1u8.hash(&mut h),
            Value::Bool(b) => (2u8, b).hash(&mut h),
            Value::Integer(n) => (3u8, n).hash(&mut h),
            Value::Float(f) => (4u8, float_key(f)).hash(&mut h),
            Value::Symbol(s) => (5u8, s).hash(&mut h),
            Value::Error(s) => (6u8, s).hash(&mut h),
            Value::Enum { enum_id, member } => (7u8, enum_id, member).hash(&mut h),
            Value::Heap(id) => (8u8, id).hash(&mut h),
            Value::StaticAstring(r) | Value::StaticUstring(r) => (9u8, r).hash(&mut h),
        }
        h.finish()
    }

    /// Key equality
    pub fn eq(&self, a: Value, b: Value) -> bool {
        match (self.key_str(a), self.key_str(b)) {
            (Some(x), Some(y)) => x == y,
            (None, None) => match (a, b) {
                (Value::Float(x), Value::Float(y)) => float_key(x) == float_key(y),
                _ => a == b,
            },
            _ => false,
        }
    }
}

/// Bits a float key hashes and compares by: `-0.0` folds into `0.0` and
/// every NaN into one NaN
fn float_key(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

impl Heap {
    /// Allocate a map (ownership of its entries moves in)
    pub fn alloc_map(&mut self, map: ValueMap) -> Result<Value, HeapError> {
        self.alloc(TYPE_MAP, ObjectData::Map(map))
    }

    fn map_ref(&self, id: ObjectId) -> Result<&ValueMap, HeapError> {
        match &self.get(id)?.data {
            ObjectData::Map(m) => Ok(m),
            _ => Err(HeapError::TypeMismatch { id, expected: "map" }),
        }
    }

    fn take_map(&mut self, id: ObjectId) -> Result<ValueMap, HeapError> {
        match &mut self.get_mut(id)?.data {
            ObjectData::Map(m) => Ok(std::mem::take(m)),
            _ => Err(HeapError::TypeMismatch { id, expected: "map" }),
        }
    }

    fn restore_map(&mut self, id: ObjectId, map: ValueMap) -> Result<(), HeapError> {
        if let ObjectData::Map(m) = &mut self.get_mut(id)?.data {
            *m = map;
        }
        Ok(())
    }

    /// Entry count of a map
    pub fn map_len(&self, id: ObjectId) -> Result<usize, HeapError> {
        self.map_ref(id).map(ValueMap::len)
    }

    /// Borrowed value stored under `key`
    pub fn map_get(&self, id: ObjectId, key: Value, statics: &str) -> Result<Option<Value>, HeapError> {
        let map = self.map_ref(id)?;
        let ctx = KeyContext::new(self, statics);
        Ok(map.get(ctx.hash(key), |k| ctx.eq(k, key)))
    }

    /// Store `value` under `key`, moving `value` in.
    ///
    /// A newly inserted key is retained. When the key already existed the
    /// previous value is handed back to the caller, unreleased.
    pub fn map_set(
        &mut self,
        id: ObjectId,
        key: Value,
        value: Value,
        statics: &str,
    ) -> Result<Option<Value>, HeapError> {
        let hash = KeyContext::new(self, statics).hash(key);
        let (exists, grow) = {
            let map = self.map_ref(id)?;
            let ctx = KeyContext::new(self, statics);
            let exists = map.contains(hash, |k| ctx.eq(k, key));
            let grow = if exists {
                0
            } else {
                map.capacity_after_insert().saturating_sub(map.capacity())
            };
            (exists, grow)
        };
        if grow > 0 {
            let bytes = grow * 2 * VALUE_BYTES;
            self.account_external(bytes)?;
            self.get_mut(id)?.external_bytes += bytes;
        }
        if !exists {
            self.retain(key)?;
        }
        let mut map = self.take_map(id)?;
        let old = {
            let ctx = KeyContext::new(self, statics);
            map.insert(hash, key, value, |k| ctx.eq(k, key))
        };
        self.restore_map(id, map)?;
        Ok(old)
    }

    /// Remove `key`, handing the stored key and value to the caller
    pub fn map_remove(
        &mut self,
        id: ObjectId,
        key: Value,
        statics: &str,
    ) -> Result<Option<(Value, Value)>, HeapError> {
        let hash = KeyContext::new(self, statics).hash(key);
        let mut map = self.take_map(id)?;
        let removed = {
            let ctx = KeyContext::new(self, statics);
            map.remove(hash, |k| ctx.eq(k, key))
        };
        self.restore_map(id, map)?;
        Ok(removed)
    }
}

//! Pooled slab heap.
//!
//! Objects live in fixed-size slots grouped into pages. Free slots are
//! threaded through a free list; when it runs dry a new page is appended.
//! Variable-size payloads (strings, list and map storage, large objects)
//! additionally take the external path, which accounts their bytes
//! against a configurable limit.
//!
//! Handles carry a slot generation that is bumped on every free, so a stale
//! handle can never alias a newer object.

use core_types::{ObjectId, RcCounters, TypeId, Value, TYPE_ASTRING, TYPE_BOX, TYPE_USTRING};
use tracing::debug;

use crate::error::HeapError;
use crate::object::{HeapObject, ObjectData, ObjectFields};

/// Heap limits.
///
/// # Examples
///
/// ```
/// use memory_manager::HeapConfig;
///
/// let config = HeapConfig::default().with_max_external_bytes(1024);
/// assert_eq!(config.max_external_bytes, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Slots per page
    pub page_slots: usize,
    /// Maximum number of live objects
    pub max_objects: usize,
    /// Maximum bytes held on the external path, reservations included
    pub max_external_bytes: usize,
    /// Report double frees and dangling retains instead of stale handles
    pub check_rc: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            page_slots: 256,
            max_objects: 1 << 24,
            max_external_bytes: 1 << 30,
            check_rc: cfg!(debug_assertions),
        }
    }
}

impl HeapConfig {
    /// Set the slots per page
    pub fn with_page_slots(mut self, n: usize) -> Self {
        self.page_slots = n.max(1);
        self
    }

    /// Set the live object limit
    pub fn with_max_objects(mut self, n: usize) -> Self {
        self.max_objects = n;
        self
    }

    /// Set the external byte limit
    pub fn with_max_external_bytes(mut self, n: usize) -> Self {
        self.max_external_bytes = n;
        self
    }

    /// Enable or disable double free and dangling retain reporting
    pub fn with_check_rc(mut self, on: bool) -> Self {
        self.check_rc = on;
        self
    }
}

#[derive(Debug)]
pub(crate) enum SlotEntry {
    Occupied(HeapObject),
    Vacant { next_free: Option<u32> },
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) entry: SlotEntry,
}

/// The object heap.
#[derive(Debug)]
pub struct Heap {
    pub(crate) config: HeapConfig,
    pub(crate) pages: Vec<Vec<Slot>>,
    pub(crate) free_head: Option<u32>,
    pub(crate) live: usize,
    pub(crate) external_bytes: usize,
    pub(crate) reserved_bytes: usize,
    pub(crate) counters: RcCounters,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

impl Heap {
    /// Empty heap with the given limits
    pub fn new(config: HeapConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
            free_head: None,
            live: 0,
            external_bytes: 0,
            reserved_bytes: 0,
            counters: RcCounters::default(),
        }
    }

    /// Current limits
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Change the external byte limit. Existing allocations are kept.
    pub fn set_max_external_bytes(&mut self, n: usize) {
        self.config.max_external_bytes = n;
    }

    /// Live object count
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Bytes held on the external path, reservations included
    pub fn external_bytes(&self) -> usize {
        self.external_bytes + self.reserved_bytes
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Reference-count counters
    pub fn counters(&self) -> &RcCounters {
        &self.counters
    }

    /// Mutable reference-count counters
    pub fn counters_mut(&mut self) -> &mut RcCounters {
        &mut self.counters
    }

    fn slot(&self, index: u32) -> Option<&Slot> {
        let per = self.config.page_slots;
        self.pages
            .get(index as usize / per)
            .and_then(|p| p.get(index as usize % per))
    }

    pub(crate) fn slot_mut(&mut self, index: u32) -> Option<&mut Slot> {
        let per = self.config.page_slots;
        self.pages
            .get_mut(index as usize / per)
            .and_then(|p| p.get_mut(index as usize % per))
    }

    fn grow(&mut self) -> Result<(), HeapError> {
        let per = self.config.page_slots;
        let base = self.pages.len() * per;
        if base >= self.config.max_objects {
            return Err(HeapError::OutOfMemory { requested: 1 });
        }
        let mut page = Vec::with_capacity(per);
        for i in 0..per {
            let next = if i + 1 < per {
                Some((base + i + 1) as u32)
            } else {
                self.free_head
            };
            page.push(Slot {
                generation: 0,
                entry: SlotEntry::Vacant { next_free: next },
            });
        }
        self.pages.push(page);
        self.free_head = Some(base as u32);
        debug!(pages = self.pages.len(), "heap grew by one page");
        Ok(())
    }

    fn take_free_slot(&mut self) -> Result<u32, HeapError> {
        if self.live >= self.config.max_objects {
            return Err(HeapError::OutOfMemory { requested: 1 });
        }
        if self.free_head.is_none() {
            self.grow()?;
        }
        let index = self.free_head.ok_or(HeapError::OutOfMemory { requested: 1 })?;
        let slot = self
            .slot_mut(index)
            .ok_or(HeapError::OutOfMemory { requested: 1 })?;
        let next = match slot.entry {
            SlotEntry::Vacant { next_free } => next_free,
            SlotEntry::Occupied(_) => None,
        };
        self.free_head = next;
        Ok(index)
    }

    fn install(&mut self, index: u32, object: HeapObject) -> ObjectId {
        let mut generation = 0;
        if let Some(slot) = self.slot_mut(index) {
            slot.entry = SlotEntry::Occupied(object);
            generation = slot.generation;
        }
        self.live += 1;
        ObjectId::new(index, generation)
    }

    /// Allocate a fixed-size object in a pool slot. Starts with rc 1.
    pub fn alloc_pool_object(&mut self, type_id: TypeId, data: ObjectData) -> Result<Value, HeapError> {
        let index = self.take_free_slot()?;
        let id = self.install(
            index,
            HeapObject {
                type_id,
                rc: 1,
                data,
                external_bytes: 0,
            },
        );
        Ok(Value::Heap(id))
    }

    /// Allocate an object whose payload accounts `bytes` on the external path.
    pub fn alloc_external_object(
        &mut self,
        type_id: TypeId,
        data: ObjectData,
        bytes: usize,
    ) -> Result<Value, HeapError> {
        self.account_external(bytes)?;
        let index = match self.take_free_slot() {
            Ok(index) => index,
            Err(e) => {
                self.external_bytes -= bytes;
                return Err(e);
            }
        };
        let id = self.install(
            index,
            HeapObject {
                type_id,
                rc: 1,
                data,
                external_bytes: bytes,
            },
        );
        Ok(Value::Heap(id))
    }

    /// Allocate on whichever path the payload needs
    pub fn alloc(&mut self, type_id: TypeId, data: ObjectData) -> Result<Value, HeapError> {
        match data.external_size() {
            Some(bytes) => self.alloc_external_object(type_id, data, bytes),
            None => self.alloc_pool_object(type_id, data),
        }
    }

    pub(crate) fn account_external(&mut self, bytes: usize) -> Result<(), HeapError> {
        if self.external_bytes() + bytes > self.config.max_external_bytes {
            return Err(HeapError::OutOfMemory { requested: bytes });
        }
        self.external_bytes += bytes;
        Ok(())
    }

    /// Reserve external bytes not tied to an object (panic buffers)
    pub fn reserve_external(&mut self, bytes: usize) -> Result<(), HeapError> {
        if self.external_bytes() + bytes > self.config.max_external_bytes {
            return Err(HeapError::OutOfMemory { requested: bytes });
        }
        self.reserved_bytes += bytes;
        Ok(())
    }

    /// Return a reservation
    pub fn unreserve_external(&mut self, bytes: usize) {
        self.reserved_bytes = self.reserved_bytes.saturating_sub(bytes);
    }

    /// Allocate a heap string
    pub fn alloc_string(&mut self, s: &str) -> Result<Value, HeapError> {
        let type_id = if s.is_ascii() { TYPE_ASTRING } else { TYPE_USTRING };
        self.alloc(type_id, ObjectData::String(s.into()))
    }

    /// Allocate a box holding `v` (ownership of `v` moves in)
    pub fn alloc_box(&mut self, v: Value) -> Result<Value, HeapError> {
        self.alloc_pool_object(TYPE_BOX, ObjectData::Box(v))
    }

    /// Allocate a user object from its fields (ownership moves in)
    pub fn alloc_object(&mut self, type_id: TypeId, fields: Vec<Value>) -> Result<Value, HeapError> {
        self.alloc(type_id, ObjectData::Object(ObjectFields::from_vec(fields)))
    }

    fn classify_missing(&self, id: ObjectId, on_release: bool) -> HeapError {
        if self.config.check_rc && self.was_freed(id) {
            if on_release {
                HeapError::DoubleFree(id)
            } else {
                HeapError::DanglingRetain(id)
            }
        } else {
            HeapError::StaleHandle(id)
        }
    }

    pub(crate) fn object_or(&self, id: ObjectId, on_release: bool) -> Result<&HeapObject, HeapError> {
        match self.slot(id.index) {
            Some(Slot {
                generation,
                entry: SlotEntry::Occupied(obj),
            }) if *generation == id.generation => Ok(obj),
            _ => Err(self.classify_missing(id, on_release)),
        }
    }

    pub(crate) fn object_mut_or(
        &mut self,
        id: ObjectId,
        on_release: bool,
    ) -> Result<&mut HeapObject, HeapError> {
        let live = matches!(
            self.slot(id.index),
            Some(Slot { generation, entry: SlotEntry::Occupied(_) }) if *generation == id.generation
        );
        if !live {
            return Err(self.classify_missing(id, on_release));
        }
        match self.slot_mut(id.index) {
            Some(Slot {
                entry: SlotEntry::Occupied(obj),
                ..
            }) => Ok(obj),
            _ => Err(HeapError::StaleHandle(id)),
        }
    }

    /// Live object behind a handle
    pub fn get(&self, id: ObjectId) -> Result<&HeapObject, HeapError> {
        self.object_or(id, false)
    }

    /// Mutable live object behind a handle
    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut HeapObject, HeapError> {
        self.object_mut_or(id, false)
    }

    /// Whether the handle names a live object
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.get(id).is_ok()
    }

    /// Whether the object behind the handle has been freed. The slot's
    /// generation moved past the handle's on that free.
    pub fn was_freed(&self, id: ObjectId) -> bool {
        self.slot(id.index)
            .is_some_and(|slot| id.generation < slot.generation)
    }

    /// Reference count of a live object
    pub fn rc(&self, id: ObjectId) -> Result<u32, HeapError> {
        self.get(id).map(|o| o.rc)
    }

    /// Runtime type id of any value
    pub fn type_id_of(&self, v: Value) -> Result<TypeId, HeapError> {
        match v {
            Value::Heap(id) => self.get(id).map(|o| o.type_id),
            other => Ok(other.immediate_type_id().unwrap_or_default()),
        }
    }

    /// Text of a heap string value
    pub fn str_of(&self, v: Value) -> Option<&str> {
        match v {
            Value::Heap(id) => match self.get(id).ok().map(|o| &o.data) {
                Some(ObjectData::String(s)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Elements of a list
    pub fn list(&self, id: ObjectId) -> Result<&Vec<Value>, HeapError> {
        match &self.get(id)?.data {
            ObjectData::List(items) => Ok(items),
            _ => Err(HeapError::TypeMismatch { id, expected: "list" }),
        }
    }

    /// Mutable elements of a list
    pub fn list_mut(&mut self, id: ObjectId) -> Result<&mut Vec<Value>, HeapError> {
        match &mut self.get_mut(id)?.data {
            ObjectData::List(items) => Ok(items),
            _ => Err(HeapError::TypeMismatch { id, expected: "list" }),
        }
    }

    /// Append to a list, accounting any storage growth
    pub fn list_push(&mut self, id: ObjectId, v: Value) -> Result<(), HeapError> {
        let (len, cap) = {
            let items = self.list(id)?;
            (items.len(), items.capacity())
        };
        if len == cap {
            let grow = cap.max(4) * crate::object::VALUE_BYTES;
            self.account_external(grow)?;
            if let Ok(obj) = self.get_mut(id) {
                obj.external_bytes += grow;
            }
        }
        self.list_mut(id)?.push(v);
        Ok(())
    }

    /// Contents of a box
    pub fn box_value(&self, id: ObjectId) -> Result<Value, HeapError> {
        match &self.get(id)?.data {
            ObjectData::Box(v) => Ok(*v),
            _ => Err(HeapError::TypeMismatch { id, expected: "box" }),
        }
    }

    /// Replace the contents of a box, returning the previous value
    pub fn set_box_value(&mut self, id: ObjectId, v: Value) -> Result<Value, HeapError> {
        match &mut self.get_mut(id)?.data {
            ObjectData::Box(slot) => Ok(std::mem::replace(slot, v)),
            _ => Err(HeapError::TypeMismatch { id, expected: "box" }),
        }
    }

    /// Handles of every live object
    pub fn live_ids(&self) -> Vec<ObjectId> {
        let per = self.config.page_slots;
        let mut out = Vec::with_capacity(self.live);
        for (p, page) in self.pages.iter().enumerate() {
            for (i, slot) in page.iter().enumerate() {
                if let SlotEntry::Occupied(_) = slot.entry {
                    out.push(ObjectId::new((p * per + i) as u32, slot.generation));
                }
            }
        }
        out
    }

    /// Vacate a slot and return its payload. Does not touch children.
    pub(crate) fn free_slot(&mut self, id: ObjectId) -> Option<HeapObject> {
        let head = self.free_head;
        let slot = self.slot_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = std::mem::replace(&mut slot.entry, SlotEntry::Vacant { next_free: head });
        let SlotEntry::Occupied(obj) = entry else {
            slot.entry = entry;
            return None;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(id.index);
        self.live -= 1;
        self.external_bytes = self.external_bytes.saturating_sub(obj.external_bytes);
        Some(obj)
    }
}

//! Heap object variants.
//!
//! Every object shares a header of runtime type id and refcount. The
//! payload is an [`ObjectData`] variant; the type id, not the variant, is
//! what the interpreter dispatches on.

use arrayvec::ArrayVec;
use core_types::{ObjectId, TypeId, Value};

use crate::fiber::FiberData;
use crate::value_map::ValueMap;

/// Field or capture count stored inline in a pool slot
pub const INLINE_FIELDS: usize = 4;

/// Approximate size of one value in external accounting
pub const VALUE_BYTES: usize = std::mem::size_of::<Value>();

/// Object fields or closure captures.
///
/// Up to [`INLINE_FIELDS`] values live inline; larger runs are spilled to a
/// separately accounted buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectFields {
    /// Inline storage
    Inline(ArrayVec<Value, INLINE_FIELDS>),
    /// Spilled storage
    Spilled(Box<[Value]>),
}

impl ObjectFields {
    /// Store `values`, inline when they fit
    pub fn from_vec(values: Vec<Value>) -> Self {
        if values.len() <= INLINE_FIELDS {
            ObjectFields::Inline(values.into_iter().collect())
        } else {
            ObjectFields::Spilled(values.into_boxed_slice())
        }
    }

    /// Fields as a slice
    pub fn as_slice(&self) -> &[Value] {
        match self {
            ObjectFields::Inline(v) => v.as_slice(),
            ObjectFields::Spilled(v) => v,
        }
    }

    /// Fields as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        match self {
            ObjectFields::Inline(v) => v.as_mut_slice(),
            ObjectFields::Spilled(v) => v,
        }
    }

    /// Field count
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Whether the fields fit in a pool slot
    pub fn is_inline(&self) -> bool {
        matches!(self, ObjectFields::Inline(_))
    }
}

/// Entry point of a bytecode function value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncRef {
    /// Function table index, used for trace names
    pub func_id: u32,
    /// Entry instruction
    pub pc: u32,
    /// Declared parameter count
    pub num_params: u8,
    /// Frame size in locals
    pub stack_size: u8,
    /// Signature id
    pub sig: u32,
}

/// Closure payload
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureData {
    /// Function entry
    pub func: FuncRef,
    /// Callee local that receives the closure on entry
    pub closure_local: u8,
    /// Captured boxes
    pub captured: ObjectFields,
}

/// Native function payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFuncData {
    /// Index into the native registry
    pub native: u32,
    /// Declared parameter count
    pub num_params: u8,
    /// Signature id
    pub sig: u32,
}

/// Variant payload of a heap object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// User-defined record
    Object(ObjectFields),
    /// Growable sequence
    List(Vec<Value>),
    /// Hash map
    Map(ValueMap),
    /// Captured mutable cell
    Box(Value),
    /// Function with captures
    Closure(ClosureData),
    /// Function without captures
    Lambda(FuncRef),
    /// Host function
    NativeFunc(NativeFuncData),
    /// Heap string; ascii-ness is carried by the type id
    String(Box<str>),
    /// Coroutine
    Fiber(Box<FiberData>),
    /// Reflective handle naming a type
    MetaType(TypeId),
}

impl ObjectData {
    /// Bytes to account on the external path, `None` for pool-sized payloads
    pub fn external_size(&self) -> Option<usize> {
        match self {
            ObjectData::List(items) => Some(items.capacity().max(1) * VALUE_BYTES),
            ObjectData::Map(map) => Some(map.capacity().max(1) * 2 * VALUE_BYTES),
            ObjectData::String(s) => Some(s.len().max(1)),
            ObjectData::Object(fields) if !fields.is_inline() => Some(fields.len() * VALUE_BYTES),
            ObjectData::Closure(c) if !c.captured.is_inline() => {
                Some(c.captured.len() * VALUE_BYTES)
            }
            _ => None,
        }
    }

    /// Consume the payload, yielding every owned child reference
    pub fn into_children(self, out: &mut Vec<Value>) {
        match self {
            ObjectData::Object(fields) => out.extend_from_slice(fields.as_slice()),
            ObjectData::List(items) => out.extend(items),
            ObjectData::Map(map) => {
                for (k, v) in map.iter() {
                    out.push(k);
                    out.push(v);
                }
            }
            ObjectData::Box(v) => out.push(v),
            ObjectData::Closure(c) => out.extend_from_slice(c.captured.as_slice()),
            ObjectData::Fiber(fiber) => fiber.owned_values(out),
            ObjectData::Lambda(_)
            | ObjectData::NativeFunc(_)
            | ObjectData::String(_)
            | ObjectData::MetaType(_) => {}
        }
    }

    /// Owned child references without consuming the payload
    pub fn children(&self) -> Vec<Value> {
        let mut out = Vec::new();
        match self {
            ObjectData::Object(fields) => out.extend_from_slice(fields.as_slice()),
            ObjectData::List(items) => out.extend_from_slice(items),
            ObjectData::Map(map) => {
                for (k, v) in map.iter() {
                    out.push(k);
                    out.push(v);
                }
            }
            ObjectData::Box(v) => out.push(*v),
            ObjectData::Closure(c) => out.extend_from_slice(c.captured.as_slice()),
            ObjectData::Fiber(fiber) => fiber.owned_values(&mut out),
            _ => {}
        }
        out
    }
}

/// A live heap object
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    /// Runtime type id
    pub type_id: TypeId,
    /// Strong reference count
    pub rc: u32,
    /// Payload
    pub data: ObjectData,
    /// Bytes accounted on the external path, zero for pool objects
    pub external_bytes: usize,
}

/// Child handles of a payload, skipping immediates
pub fn child_ids(data: &ObjectData) -> impl Iterator<Item = ObjectId> {
    data.children().into_iter().filter_map(|v| v.as_heap())
}

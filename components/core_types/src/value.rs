//! Tagged value representation.
//!
//! A [`Value`] is either an immediate scalar, which carries no ownership
//! obligation, or a handle to a reference-counted heap object. Extracting
//! "is this a heap handle" and the type id of an immediate is a single
//! discriminant test, which keeps the dispatch loop branch-cheap.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::type_id::{self, TypeId};

/// Identifier of an interned symbol (tags, error names, method names).
pub type SymbolId = u32;

/// Handle to a heap object.
///
/// `index` addresses a slot in the heap; `generation` is bumped every time the
/// slot is freed so that a stale handle can never alias a newer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    /// Slot index in the heap
    pub index: u32,
    /// Slot generation at allocation time
    pub generation: u32,
}

impl ObjectId {
    /// Create a handle from its raw parts
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Reference into the interned string buffer of a bytecode chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrRef {
    /// Byte offset into the string buffer
    pub start: u32,
    /// Byte length
    pub len: u32,
}

impl StrRef {
    /// Create a string reference
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// Byte range covered by this reference
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// A runtime value.
///
/// # Examples
///
/// ```
/// use core_types::{Value, type_id};
///
/// let n = Value::Integer(5);
/// assert!(!n.is_heap());
/// assert_eq!(n.immediate_type_id(), Some(type_id::TYPE_INTEGER));
/// assert!(n.is_truthy());
/// assert!(!Value::None.is_truthy());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// The `none` value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Symbol literal (`#name`)
    Symbol(SymbolId),
    /// Error value naming a symbol (`error.Name`)
    Error(SymbolId),
    /// Enum member
    Enum {
        /// Enum type
        enum_id: u32,
        /// Member index
        member: u32,
    },
    /// ASCII string living in the chunk string buffer
    StaticAstring(StrRef),
    /// Unicode string living in the chunk string buffer
    StaticUstring(StrRef),
    /// Reference-counted heap object
    Heap(ObjectId),
}

impl Value {
    /// Whether this value carries an ownership obligation.
    #[inline]
    pub fn is_heap(&self) -> bool {
        matches!(self, Value::Heap(_))
    }

    /// Heap handle, if any.
    #[inline]
    pub fn as_heap(&self) -> Option<ObjectId> {
        match self {
            Value::Heap(id) => Some(*id),
            _ => None,
        }
    }

    /// Type id of an immediate, `None` for heap values (their type lives in
    /// the object header).
    #[inline]
    pub fn immediate_type_id(&self) -> Option<TypeId> {
        Some(match self {
            Value::None => type_id::TYPE_NONE,
            Value::Bool(_) => type_id::TYPE_BOOLEAN,
            Value::Integer(_) => type_id::TYPE_INTEGER,
            Value::Float(_) => type_id::TYPE_FLOAT,
            Value::Symbol(_) => type_id::TYPE_SYMBOL,
            Value::Error(_) => type_id::TYPE_ERROR,
            Value::Enum { .. } => type_id::TYPE_ENUM,
            Value::StaticAstring(_) => type_id::TYPE_STATIC_ASTRING,
            Value::StaticUstring(_) => type_id::TYPE_STATIC_USTRING,
            Value::Heap(_) => return None,
        })
    }

    /// `none` and `false` are falsey, everything else is truthy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::None | Value::Bool(false))
    }

    /// Whether this is the `none` value
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Integer payload
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Static string reference, if this is a static string of either kind
    pub fn as_static_str(&self) -> Option<StrRef> {
        match self {
            Value::StaticAstring(s) | Value::StaticUstring(s) => Some(*s),
            _ => None,
        }
    }
}

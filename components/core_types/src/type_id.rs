//! Runtime type ids and semantic type ids.
//!
//! Runtime type ids identify the concrete representation of a value and are
//! stored in every heap object header. Semantic type ids are what function
//! signatures and field declarations are written in; several runtime types
//! can satisfy one semantic type (e.g. every string representation satisfies
//! `SEMA_TYPE_STRING`).

/// Runtime type identity
pub type TypeId = u32;

/// Semantic (declared) type identity
pub type SemaTypeId = u32;

#[allow(missing_docs)]
mod ids {
    use super::TypeId;
    pub const TYPE_NONE: TypeId = 0;
    pub const TYPE_BOOLEAN: TypeId = 1;
    pub const TYPE_ERROR: TypeId = 2;
    pub const TYPE_STATIC_ASTRING: TypeId = 3;
    pub const TYPE_STATIC_USTRING: TypeId = 4;
    pub const TYPE_ENUM: TypeId = 5;
    pub const TYPE_SYMBOL: TypeId = 6;
    pub const TYPE_INTEGER: TypeId = 7;
    pub const TYPE_FLOAT: TypeId = 8;
    pub const TYPE_LIST: TypeId = 9;
    pub const TYPE_LIST_ITER: TypeId = 10;
    pub const TYPE_MAP: TypeId = 11;
    pub const TYPE_MAP_ITER: TypeId = 12;
    pub const TYPE_CLOSURE: TypeId = 13;
    pub const TYPE_LAMBDA: TypeId = 14;
    pub const TYPE_ASTRING: TypeId = 15;
    pub const TYPE_USTRING: TypeId = 16;
    pub const TYPE_STRING_SLICE: TypeId = 17;
    pub const TYPE_RAWSTRING: TypeId = 18;
    pub const TYPE_RAWSTRING_SLICE: TypeId = 19;
    pub const TYPE_FIBER: TypeId = 20;
    pub const TYPE_BOX: TypeId = 21;
    pub const TYPE_NATIVE_FUNC: TypeId = 22;
    pub const TYPE_TCC_STATE: TypeId = 23;
    pub const TYPE_POINTER: TypeId = 24;
    pub const TYPE_FILE: TypeId = 25;
    pub const TYPE_DIR: TypeId = 26;
    pub const TYPE_DIR_ITER: TypeId = 27;
    pub const TYPE_METATYPE: TypeId = 28;

    use super::SemaTypeId;
    pub const SEMA_TYPE_ANY: SemaTypeId = 0;
    pub const SEMA_TYPE_BOOLEAN: SemaTypeId = 1;
    pub const SEMA_TYPE_FLOAT: SemaTypeId = 2;
    pub const SEMA_TYPE_INTEGER: SemaTypeId = 3;
    pub const SEMA_TYPE_STRING: SemaTypeId = 4;
    pub const SEMA_TYPE_RAWSTRING: SemaTypeId = 5;
    pub const SEMA_TYPE_SYMBOL: SemaTypeId = 6;
    pub const SEMA_TYPE_LIST: SemaTypeId = 7;
    pub const SEMA_TYPE_MAP: SemaTypeId = 8;
    pub const SEMA_TYPE_POINTER: SemaTypeId = 9;
    pub const SEMA_TYPE_NONE: SemaTypeId = 10;
    pub const SEMA_TYPE_ERROR: SemaTypeId = 11;
    pub const SEMA_TYPE_FIBER: SemaTypeId = 12;
    pub const SEMA_TYPE_METATYPE: SemaTypeId = 13;
    pub const SEMA_TYPE_UNDEFINED: SemaTypeId = 14;
    pub const SEMA_TYPE_STATICSTRING: SemaTypeId = 15;
    pub const SEMA_TYPE_FILE: SemaTypeId = 16;
    pub const SEMA_TYPE_DYNAMIC: SemaTypeId = 17;
}

pub use ids::*;

/// Number of builtin semantic types. Ids at or above this refer to user types.
pub const NUM_SEMA_TYPES: SemaTypeId = 18;

/// First type id handed out to user-declared object types.
pub const FIRST_USER_TYPE_ID: TypeId = 29;

/// Display name of a builtin runtime type.
pub fn builtin_type_name(id: TypeId) -> Option<&'static str> {
    Some(match id {
        TYPE_NONE => "none",
        TYPE_BOOLEAN => "boolean",
        TYPE_ERROR => "error",
        TYPE_STATIC_ASTRING | TYPE_STATIC_USTRING | TYPE_ASTRING | TYPE_USTRING
        | TYPE_STRING_SLICE => "string",
        TYPE_ENUM => "enum",
        TYPE_SYMBOL => "symbol",
        TYPE_INTEGER => "int",
        TYPE_FLOAT => "float",
        TYPE_LIST => "List",
        TYPE_LIST_ITER => "ListIterator",
        TYPE_MAP => "Map",
        TYPE_MAP_ITER => "MapIterator",
        TYPE_CLOSURE | TYPE_LAMBDA | TYPE_NATIVE_FUNC => "Function",
        TYPE_RAWSTRING | TYPE_RAWSTRING_SLICE => "rawstring",
        TYPE_FIBER => "Fiber",
        TYPE_BOX => "Box",
        TYPE_TCC_STATE => "TccState",
        TYPE_POINTER => "pointer",
        TYPE_FILE => "File",
        TYPE_DIR => "Dir",
        TYPE_DIR_ITER => "DirIterator",
        TYPE_METATYPE => "MetaType",
        _ => return None,
    })
}

/// Display name of a builtin semantic type.
pub fn sema_type_name(id: SemaTypeId) -> Option<&'static str> {
    Some(match id {
        SEMA_TYPE_ANY => "any",
        SEMA_TYPE_BOOLEAN => "boolean",
        SEMA_TYPE_FLOAT => "float",
        SEMA_TYPE_INTEGER => "int",
        SEMA_TYPE_STRING => "string",
        SEMA_TYPE_RAWSTRING => "rawstring",
        SEMA_TYPE_SYMBOL => "symbol",
        SEMA_TYPE_LIST => "List",
        SEMA_TYPE_MAP => "Map",
        SEMA_TYPE_POINTER => "pointer",
        SEMA_TYPE_NONE => "none",
        SEMA_TYPE_ERROR => "error",
        SEMA_TYPE_FIBER => "Fiber",
        SEMA_TYPE_METATYPE => "MetaType",
        SEMA_TYPE_UNDEFINED => "undefined",
        SEMA_TYPE_STATICSTRING => "string",
        SEMA_TYPE_FILE => "File",
        SEMA_TYPE_DYNAMIC => "dynamic",
        _ => return None,
    })
}

/// Whether a value of runtime type `type_id` satisfies builtin semantic type
/// `sema`. User semantic types (`>= NUM_SEMA_TYPES`) are resolved by the
/// caller against its type table.
pub fn satisfies_builtin(type_id: TypeId, sema: SemaTypeId) -> bool {
    match sema {
        SEMA_TYPE_ANY | SEMA_TYPE_DYNAMIC => true,
        SEMA_TYPE_BOOLEAN => type_id == TYPE_BOOLEAN,
        SEMA_TYPE_FLOAT => type_id == TYPE_FLOAT,
        SEMA_TYPE_INTEGER => type_id == TYPE_INTEGER,
        SEMA_TYPE_STRING => matches!(
            type_id,
            TYPE_STATIC_ASTRING | TYPE_STATIC_USTRING | TYPE_ASTRING | TYPE_USTRING | TYPE_STRING_SLICE
        ),
        SEMA_TYPE_STATICSTRING => matches!(type_id, TYPE_STATIC_ASTRING | TYPE_STATIC_USTRING),
        SEMA_TYPE_RAWSTRING => matches!(type_id, TYPE_RAWSTRING | TYPE_RAWSTRING_SLICE),
        SEMA_TYPE_SYMBOL => type_id == TYPE_SYMBOL,
        SEMA_TYPE_LIST => type_id == TYPE_LIST,
        SEMA_TYPE_MAP => type_id == TYPE_MAP,
        SEMA_TYPE_POINTER => type_id == TYPE_POINTER,
        SEMA_TYPE_NONE => type_id == TYPE_NONE,
        SEMA_TYPE_ERROR => type_id == TYPE_ERROR,
        SEMA_TYPE_FIBER => type_id == TYPE_FIBER,
        SEMA_TYPE_METATYPE => type_id == TYPE_METATYPE,
        SEMA_TYPE_FILE => type_id == TYPE_FILE,
        _ => false,
    }
}

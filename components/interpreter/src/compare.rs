//! Equality, type tests and display strings.

use core_types::{
    builtin_type_name, satisfies_builtin, sema_type_name, SemaTypeId, TypeId, Value,
    FIRST_USER_TYPE_ID, NUM_SEMA_TYPES, SEMA_TYPE_STRING,
};
use memory_manager::ObjectData;

use crate::vm::Vm;

impl Vm {
    /// Runtime equality: strings compare by content, everything else by
    /// identity or immediate value
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        match (self.str_of(a), self.str_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Whether a value of `type_id` satisfies `sema`
    pub fn satisfies(&self, type_id: TypeId, sema: SemaTypeId) -> bool {
        if sema < NUM_SEMA_TYPES {
            satisfies_builtin(type_id, sema)
        } else {
            type_id == FIRST_USER_TYPE_ID + (sema - NUM_SEMA_TYPES)
        }
    }

    /// Whether `Cast` from `from` to `to` succeeds
    pub(crate) fn cast_ok(&self, from: TypeId, to: TypeId) -> bool {
        from == to || (satisfies_builtin(from, SEMA_TYPE_STRING) && satisfies_builtin(to, SEMA_TYPE_STRING))
    }

    /// Display name of a runtime type
    pub fn type_name(&self, type_id: TypeId) -> String {
        if let Some(name) = builtin_type_name(type_id) {
            return name.to_string();
        }
        self.chunk
            .type_decl(type_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("type#{type_id}"))
    }

    /// Display name of a semantic type
    pub fn sema_name(&self, sema: SemaTypeId) -> String {
        if let Some(name) = sema_type_name(sema) {
            return name.to_string();
        }
        self.type_name(FIRST_USER_TYPE_ID + sema.saturating_sub(NUM_SEMA_TYPES))
    }

    fn symbol_text(&self, sym: u32) -> String {
        self.symbols
            .symbol_name(sym)
            .map(str::to_string)
            .unwrap_or_else(|| sym.to_string())
    }

    /// Text shown by `print` and string templates
    pub fn value_to_string(&self, v: Value) -> String {
        match v {
            Value::None => "none".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.1}"),
            Value::Float(f) => f.to_string(),
            Value::Symbol(s) => format!("#{}", self.symbol_text(s)),
            Value::Error(s) => format!("error.{}", self.symbol_text(s)),
            Value::Enum { enum_id, member } => match self.chunk.enums.get(enum_id as usize) {
                Some(decl) => format!(
                    "{}.{}",
                    decl.name,
                    decl.members.get(member as usize).map(String::as_str).unwrap_or("?")
                ),
                None => format!("enum#{enum_id}.{member}"),
            },
            Value::StaticAstring(_) | Value::StaticUstring(_) => {
                self.str_of(v).unwrap_or_default().to_string()
            }
            Value::Heap(id) => {
                let Ok(obj) = self.heap.get(id) else {
                    return format!("<freed {id}>");
                };
                match &obj.data {
                    ObjectData::String(s) => s.to_string(),
                    ObjectData::List(items) => format!("List ({})", items.len()),
                    ObjectData::Map(map) => format!("Map ({})", map.len()),
                    ObjectData::MetaType(t) => format!("MetaType({})", self.type_name(*t)),
                    _ => self.type_name(obj.type_id),
                }
            }
        }
    }
}

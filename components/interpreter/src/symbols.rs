//! Runtime symbol tables.
//!
//! Built from a chunk's resolved tables at load time. Function symbols can
//! be rebound at run time (`SetStaticFunc`), and the host can register
//! natives; every such structural change bumps [`Symbols::generation`],
//! which inline caches record and compare on every hit.

use std::collections::HashMap;

use bytecode_system::{BytecodeChunk, ChunkError, FuncEntry, FuncSig};
use core_types::{
    SymbolId, TypeId, Value, TYPE_ASTRING, TYPE_LIST, TYPE_MAP, TYPE_STATIC_ASTRING,
    TYPE_STATIC_USTRING, TYPE_USTRING,
};
use memory_manager::FuncRef;

use crate::error::VmError;
use crate::natives::NativeRegistry;

/// Resolved call target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncTarget {
    /// Bytecode function
    Func(FuncRef),
    /// Host function
    Native {
        /// Registry index
        native: u32,
        /// Parameter count, receiver included
        num_params: u8,
        /// Signature id
        sig: u32,
    },
}

impl FuncTarget {
    /// Signature id of the target
    pub fn sig(&self) -> u32 {
        match self {
            FuncTarget::Func(f) => f.sig,
            FuncTarget::Native { sig, .. } => *sig,
        }
    }
}

/// Current binding of a function symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FuncBinding {
    /// Bound at load time
    Target(FuncTarget),
    /// Rebound to a function value, owned by the table
    Value(Value),
}

/// A named function symbol
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSymbol {
    /// Symbol name
    pub name: String,
    /// Declared signature id
    pub sig: u32,
    /// Load-time target
    pub target: FuncTarget,
    /// Current binding
    pub binding: FuncBinding,
}

/// Symbol ids of the errors the interpreter raises itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeErrors {
    /// Index outside a list
    pub out_of_bounds: SymbolId,
    /// Field not present on the receiver
    pub missing_field: SymbolId,
    /// Operand of the wrong type
    pub invalid_argument: SymbolId,
    /// Resume of a fiber that cannot run
    pub invalid_resume: SymbolId,
    /// Integer division or modulo by zero
    pub division_by_zero: SymbolId,
    /// Method not defined for the receiver type
    pub missing_symbol: SymbolId,
}

/// Builtin methods installed for every chunk that names them
const BUILTIN_METHODS: &[(&[TypeId], &str, &str)] = &[
    (&[TYPE_LIST], "len", "len"),
    (&[TYPE_LIST], "append", "append"),
    (&[TYPE_LIST], "remove", "remove"),
    (&[TYPE_MAP], "size", "len"),
    (&[TYPE_MAP], "remove", "remove"),
    (
        &[TYPE_STATIC_ASTRING, TYPE_STATIC_USTRING, TYPE_ASTRING, TYPE_USTRING],
        "len",
        "len",
    ),
];

/// Function, method and symbol tables of a loaded program
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    funcs: Vec<FuncSymbol>,
    methods: HashMap<(TypeId, u32), FuncTarget>,
    names: Vec<String>,
    sigs: Vec<FuncSig>,
    errors: RuntimeErrors,
    generation: u64,
}

impl Symbols {
    /// Resolve a chunk's tables against the native registry
    pub fn load(chunk: &BytecodeChunk, natives: &NativeRegistry) -> Result<Self, VmError> {
        let mut symbols = Symbols {
            names: chunk.symbols.clone(),
            sigs: chunk.sigs.clone(),
            ..Default::default()
        };
        for decl in &chunk.func_syms {
            let target = symbols.resolve(chunk, &decl.entry, natives)?;
            symbols.funcs.push(FuncSymbol {
                name: decl.name.clone(),
                sig: target.sig(),
                target,
                binding: FuncBinding::Target(target),
            });
        }
        for (types, method, native) in BUILTIN_METHODS {
            let Some(sym) = chunk.method_names.iter().position(|n| n == method) else {
                continue;
            };
            let Some(idx) = natives.lookup(native) else {
                continue;
            };
            let num_params = natives.get(idx).map(|n| n.num_params).unwrap_or(1);
            let sig = symbols.untyped_sig(num_params as usize);
            for type_id in *types {
                symbols.methods.insert(
                    (*type_id, sym as u32),
                    FuncTarget::Native {
                        native: idx,
                        num_params,
                        sig,
                    },
                );
            }
        }
        for decl in &chunk.methods {
            let Some(sym) = chunk.method_names.iter().position(|n| *n == decl.name) else {
                continue;
            };
            let target = symbols.resolve(chunk, &decl.entry, natives)?;
            symbols.methods.insert((decl.type_id, sym as u32), target);
        }
        symbols.errors = RuntimeErrors {
            out_of_bounds: symbols.ensure_symbol("OutOfBounds"),
            missing_field: symbols.ensure_symbol("MissingField"),
            invalid_argument: symbols.ensure_symbol("InvalidArgument"),
            invalid_resume: symbols.ensure_symbol("InvalidResume"),
            division_by_zero: symbols.ensure_symbol("DivisionByZero"),
            missing_symbol: symbols.ensure_symbol("MissingSymbol"),
        };
        Ok(symbols)
    }

    fn resolve(
        &self,
        chunk: &BytecodeChunk,
        entry: &FuncEntry,
        natives: &NativeRegistry,
    ) -> Result<FuncTarget, VmError> {
        match entry {
            FuncEntry::Func(id) => {
                let decl = chunk
                    .funcs
                    .get(*id as usize)
                    .ok_or(VmError::InvalidProgram(ChunkError::UnknownRef {
                        pc: 0,
                        table: "function",
                        id: *id,
                    }))?;
                Ok(FuncTarget::Func(FuncRef {
                    func_id: *id,
                    pc: decl.pc,
                    num_params: decl.num_params,
                    stack_size: decl.stack_size,
                    sig: decl.sig,
                }))
            }
            FuncEntry::Native { name, sig } => {
                let native = natives
                    .lookup(name)
                    .ok_or_else(|| VmError::UnknownNative(name.clone()))?;
                let num_params = natives.get(native).map(|n| n.num_params).unwrap_or_default();
                let found = chunk.sigs.get(*sig as usize).map(|s| s.arity()).unwrap_or_default();
                if found != num_params as usize {
                    return Err(VmError::NativeArity {
                        name: name.clone(),
                        expected: num_params,
                        found,
                    });
                }
                Ok(FuncTarget::Native {
                    native,
                    num_params,
                    sig: *sig,
                })
            }
        }
    }

    fn untyped_sig(&mut self, n: usize) -> u32 {
        let sig = FuncSig::untyped(n);
        match self.sigs.iter().position(|s| *s == sig) {
            Some(idx) => idx as u32,
            None => {
                self.sigs.push(sig);
                (self.sigs.len() - 1) as u32
            }
        }
    }

    /// Id of a symbol name, appending it when missing
    pub fn ensure_symbol(&mut self, name: &str) -> SymbolId {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => idx as SymbolId,
            None => {
                self.names.push(name.to_string());
                (self.names.len() - 1) as SymbolId
            }
        }
    }

    /// Name of a symbol
    pub fn symbol_name(&self, id: SymbolId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Errors raised by the interpreter
    pub fn errors(&self) -> &RuntimeErrors {
        &self.errors
    }

    /// Current table generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record a structural change
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Function symbol by id
    pub fn func(&self, id: u32) -> Option<&FuncSymbol> {
        self.funcs.get(id as usize)
    }

    /// Function symbol id by name
    pub fn func_id(&self, name: &str) -> Option<u32> {
        self.funcs.iter().position(|f| f.name == name).map(|i| i as u32)
    }

    /// Number of function symbols
    pub fn num_funcs(&self) -> usize {
        self.funcs.len()
    }

    /// Replace a symbol's binding, returning the previous one
    pub fn rebind(&mut self, id: u32, binding: FuncBinding) -> Option<FuncBinding> {
        let slot = self.funcs.get_mut(id as usize)?;
        let old = std::mem::replace(&mut slot.binding, binding);
        self.generation += 1;
        Some(old)
    }

    /// Method bound to a receiver type
    pub fn method(&self, type_id: TypeId, method: u32) -> Option<FuncTarget> {
        self.methods.get(&(type_id, method)).copied()
    }

    /// Bind a method at run time
    pub fn set_method(&mut self, type_id: TypeId, method: u32, target: FuncTarget) {
        self.methods.insert((type_id, method), target);
        self.generation += 1;
    }

    /// Signature by id
    pub fn sig(&self, id: u32) -> Option<&FuncSig> {
        self.sigs.get(id as usize)
    }

    /// Values owned by rebound function symbols
    pub fn bound_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.funcs.iter().filter_map(|f| match f.binding {
            FuncBinding::Value(v) => Some(v),
            FuncBinding::Target(_) => None,
        })
    }

    /// Take every rebound value, restoring load-time bindings
    pub fn take_bound_values(&mut self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for f in &mut self.funcs {
            if let FuncBinding::Value(v) = f.binding {
                out.push((f.name.clone(), v));
                f.binding = FuncBinding::Target(f.target);
            }
        }
        if !out.is_empty() {
            self.generation += 1;
        }
        out
    }
}

//! Bytecode chunk: the compiled program handed to the interpreter.
//!
//! A chunk bundles the instruction stream with its constant pool, interned
//! string buffer, resolved symbol tables, debug table and unwind release
//! table. The interpreter treats all of it as read-only at run time.

use std::collections::{BTreeMap, HashMap};

use core_types::{SourcePosition, StrRef, TypeId, Value};
use serde::{Deserialize, Serialize};

use crate::constant::Const;
use crate::debug::{DebugSym, DebugTable};
use crate::error::ChunkError;
use crate::opcode::{Local, Opcode, Pc};
use crate::tables::{
    user_type_id, user_type_index, EnumDecl, FieldDecl, FuncDecl, FuncEntry, FuncSig,
    FuncSymDecl, MethodDecl, StaticVarDecl, TypeDecl,
};

/// A compiled program.
///
/// # Examples
///
/// ```
/// use bytecode_system::{BytecodeChunk, Const, Opcode};
///
/// let mut chunk = BytecodeChunk::new();
/// chunk.main_stack_size = 4;
/// let idx = chunk.add_const(Const::String("hi".into()));
/// chunk.emit(Opcode::ConstOp { idx, dst: 1 });
/// chunk.emit(Opcode::End);
///
/// assert!(chunk.validate().is_ok());
/// assert_eq!(chunk.str_of(chunk.constant(idx).unwrap()), Some("hi"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytecodeChunk {
    /// Instruction stream
    pub instructions: Vec<Opcode>,
    /// Constant pool in source form
    pub constants: Vec<Const>,
    /// Locals needed by the top-level frame
    pub main_stack_size: u8,
    /// Bytecode function table
    pub funcs: Vec<FuncDecl>,
    /// Function symbol table
    pub func_syms: Vec<FuncSymDecl>,
    /// Signature table
    pub sigs: Vec<FuncSig>,
    /// User type table
    pub types: Vec<TypeDecl>,
    /// Field name table
    pub field_names: Vec<String>,
    /// Methods bound to receiver types
    pub methods: Vec<MethodDecl>,
    /// Method name table
    pub method_names: Vec<String>,
    /// Symbol name table (tag literals and error names)
    pub symbols: Vec<String>,
    /// Enum table
    pub enums: Vec<EnumDecl>,
    /// Static variable table
    pub static_vars: Vec<StaticVarDecl>,
    /// Source positions
    pub debug: DebugTable,
    /// Source file name
    pub source_url: Option<String>,
    /// Locals owned at a pc, released when unwinding or returning through it
    pub release_table: BTreeMap<Pc, Vec<Local>>,

    #[serde(skip)]
    values: Vec<Value>,
    #[serde(skip)]
    strings: String,
    #[serde(skip)]
    interned: HashMap<String, StrRef>,
}

impl BytecodeChunk {
    /// Create an empty chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a chunk from its JSON form and validate it
    pub fn from_json(json: &str) -> Result<Self, ChunkError> {
        let mut chunk: BytecodeChunk = serde_json::from_str(json)?;
        chunk.rebuild_pools();
        chunk.debug.normalize();
        chunk.validate()?;
        Ok(chunk)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, ChunkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn rebuild_pools(&mut self) {
        self.values.clear();
        self.strings.clear();
        self.interned.clear();
        let constants = std::mem::take(&mut self.constants);
        for c in &constants {
            let value = self.const_value(c);
            self.values.push(value);
        }
        self.constants = constants;
    }

    fn const_value(&mut self, c: &Const) -> Value {
        match c {
            Const::String(s) => self.intern_str(s),
            other => other.to_immediate().unwrap_or_default(),
        }
    }

    /// Append an instruction, returning its pc
    pub fn emit(&mut self, opcode: Opcode) -> Pc {
        let pc = self.instructions.len() as Pc;
        self.instructions.push(opcode);
        pc
    }

    /// Append an instruction and record its source position
    pub fn emit_with_position(
        &mut self,
        opcode: Opcode,
        pos: SourcePosition,
        func: Option<u32>,
    ) -> Pc {
        let pc = self.emit(opcode);
        self.debug.insert(DebugSym { pc, pos, func });
        pc
    }

    /// Replace the instruction at `pc`, used to patch forward jumps
    pub fn patch(&mut self, pc: Pc, opcode: Opcode) {
        if let Some(slot) = self.instructions.get_mut(pc as usize) {
            *slot = opcode;
        }
    }

    /// Pc of the next emitted instruction
    pub fn next_pc(&self) -> Pc {
        self.instructions.len() as Pc
    }

    /// Add a constant and return its index
    pub fn add_const(&mut self, c: Const) -> u32 {
        let value = self.const_value(&c);
        self.constants.push(c);
        self.values.push(value);
        (self.constants.len() - 1) as u32
    }

    /// Run-time value of a constant
    pub fn constant(&self, idx: u32) -> Option<Value> {
        self.values.get(idx as usize).copied()
    }

    /// Intern a string literal and return its static string value
    pub fn intern_str(&mut self, s: &str) -> Value {
        let r = match self.interned.get(s) {
            Some(r) => *r,
            None => {
                let r = StrRef::new(self.strings.len() as u32, s.len() as u32);
                self.strings.push_str(s);
                self.interned.insert(s.to_string(), r);
                r
            }
        };
        if s.is_ascii() {
            Value::StaticAstring(r)
        } else {
            Value::StaticUstring(r)
        }
    }

    /// The interned string buffer
    pub fn string_buffer(&self) -> &str {
        &self.strings
    }

    /// Text of a static string value
    pub fn str_of(&self, value: Value) -> Option<&str> {
        value
            .as_static_str()
            .and_then(|r| self.strings.get(r.range()))
    }

    /// Register a bytecode function
    pub fn add_func(&mut self, decl: FuncDecl) -> u32 {
        self.funcs.push(decl);
        (self.funcs.len() - 1) as u32
    }

    /// Register a function symbol
    pub fn add_func_sym(&mut self, name: &str, entry: FuncEntry) -> u32 {
        self.func_syms.push(FuncSymDecl {
            name: name.to_string(),
            entry,
        });
        (self.func_syms.len() - 1) as u32
    }

    /// Register a signature, reusing an identical one
    pub fn add_sig(&mut self, sig: FuncSig) -> u32 {
        if let Some(idx) = self.sigs.iter().position(|s| *s == sig) {
            return idx as u32;
        }
        self.sigs.push(sig);
        (self.sigs.len() - 1) as u32
    }

    /// Register a user type and return its runtime type id
    pub fn add_type(&mut self, name: &str, fields: Vec<FieldDecl>) -> TypeId {
        for f in &fields {
            self.field_sym(&f.name);
        }
        self.types.push(TypeDecl {
            name: name.to_string(),
            fields,
        });
        user_type_id(self.types.len() - 1)
    }

    /// Intern a field name
    pub fn field_sym(&mut self, name: &str) -> u32 {
        intern_name(&mut self.field_names, name)
    }

    /// Intern a method name
    pub fn method_sym(&mut self, name: &str) -> u32 {
        intern_name(&mut self.method_names, name)
    }

    /// Intern a symbol name
    pub fn symbol(&mut self, name: &str) -> u32 {
        intern_name(&mut self.symbols, name)
    }

    /// Bind a method to a receiver type
    pub fn add_method(&mut self, type_id: TypeId, name: &str, entry: FuncEntry) -> u32 {
        self.method_sym(name);
        self.methods.push(MethodDecl {
            type_id,
            name: name.to_string(),
            entry,
        });
        (self.methods.len() - 1) as u32
    }

    /// Register an enum
    pub fn add_enum(&mut self, name: &str, members: &[&str]) -> u32 {
        self.enums.push(EnumDecl {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        (self.enums.len() - 1) as u32
    }

    /// Register a static variable
    pub fn add_static_var(&mut self, name: &str, init: Option<u32>) -> u32 {
        self.static_vars.push(StaticVarDecl {
            name: name.to_string(),
            init,
        });
        (self.static_vars.len() - 1) as u32
    }

    /// Record the locals owned at `pc`
    pub fn set_release_set(&mut self, pc: Pc, locals: Vec<Local>) {
        self.release_table.insert(pc, locals);
    }

    /// Locals owned at `pc`
    pub fn release_set(&self, pc: Pc) -> &[Local] {
        self.release_table
            .get(&pc)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// User type declaration for a runtime type id
    pub fn type_decl(&self, type_id: TypeId) -> Option<&TypeDecl> {
        user_type_index(type_id).and_then(|idx| self.types.get(idx))
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the chunk has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Check every table reference and branch target.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.instructions.is_empty() {
            return Err(ChunkError::Empty);
        }
        let len = self.instructions.len() as Pc;
        for (pc, op) in self.instructions.iter().enumerate() {
            let pc = pc as Pc;
            for target in op.branch_targets() {
                if target >= len {
                    return Err(ChunkError::TargetOutOfRange { pc, target });
                }
            }
            for idx in op.constant_refs() {
                if idx as usize >= self.constants.len() {
                    return Err(ChunkError::ConstantOutOfRange { pc, idx });
                }
            }
            self.validate_refs(pc, op)?;
        }
        for (idx, f) in self.funcs.iter().enumerate() {
            if f.pc >= len {
                return Err(ChunkError::TargetOutOfRange {
                    pc: f.pc,
                    target: f.pc,
                });
            }
            self.check(idx as Pc, "signature", f.sig, self.sigs.len())?;
        }
        for (idx, s) in self.func_syms.iter().enumerate() {
            self.validate_entry(idx as Pc, &s.entry)?;
        }
        for (idx, m) in self.methods.iter().enumerate() {
            self.validate_entry(idx as Pc, &m.entry)?;
        }
        for v in &self.static_vars {
            if let Some(idx) = v.init {
                if idx as usize >= self.constants.len() {
                    return Err(ChunkError::ConstantOutOfRange { pc: 0, idx });
                }
            }
        }
        Ok(())
    }

    fn validate_entry(&self, at: Pc, entry: &FuncEntry) -> Result<(), ChunkError> {
        match entry {
            FuncEntry::Func(id) => self.check(at, "function", *id, self.funcs.len()),
            FuncEntry::Native { sig, .. } => self.check(at, "signature", *sig, self.sigs.len()),
        }
    }

    fn validate_refs(&self, pc: Pc, op: &Opcode) -> Result<(), ChunkError> {
        match op {
            Opcode::CallSym { func, .. }
            | Opcode::StaticFunc { func, .. }
            | Opcode::SetStaticFunc { func, .. } => {
                self.check(pc, "function symbol", *func, self.func_syms.len())
            }
            Opcode::Lambda { func, .. } | Opcode::Closure { func, .. } => {
                self.check(pc, "function", *func, self.funcs.len())
            }
            Opcode::CallObjSym { method, .. } => {
                self.check(pc, "method", *method, self.method_names.len())
            }
            Opcode::CallTypeCheck { sig, .. } => self.check(pc, "signature", *sig, self.sigs.len()),
            Opcode::Field { field, .. }
            | Opcode::FieldRetain { field, .. }
            | Opcode::SetField { field, .. }
            | Opcode::SetFieldRelease { field, .. }
            | Opcode::SetCheckFieldRelease { field, .. } => {
                self.check(pc, "field", *field, self.field_names.len())
            }
            Opcode::ObjectSmall { type_id, .. }
            | Opcode::Object { type_id, .. }
            | Opcode::Sym { type_id, .. } => match self.type_decl(*type_id) {
                Some(_) => Ok(()),
                None => Err(ChunkError::UnknownRef {
                    pc,
                    table: "type",
                    id: *type_id,
                }),
            },
            Opcode::TagLiteral { sym, .. } => self.check(pc, "symbol", *sym, self.symbols.len()),
            Opcode::Tag { enum_id, .. } => self.check(pc, "enum", *enum_id, self.enums.len()),
            Opcode::StaticVar { var, .. } | Opcode::SetStaticVar { var, .. } => {
                self.check(pc, "static variable", *var, self.static_vars.len())
            }
            _ => Ok(()),
        }
    }

    fn check(&self, pc: Pc, table: &'static str, id: u32, len: usize) -> Result<(), ChunkError> {
        if (id as usize) < len {
            Ok(())
        } else {
            Err(ChunkError::UnknownRef { pc, table, id })
        }
    }
}

fn intern_name(names: &mut Vec<String>, name: &str) -> u32 {
    match names.iter().position(|n| n == name) {
        Some(idx) => idx as u32,
        None => {
            names.push(name.to_string());
            (names.len() - 1) as u32
        }
    }
}

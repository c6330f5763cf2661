//! Instruction set for the register VM.
//!
//! Every operand that names a local is a `u8` offset from the current frame
//! pointer. Jump targets and catch pcs are absolute instruction indices.

use serde::{Deserialize, Serialize};

/// Local slot offset from the frame pointer
pub type Local = u8;

/// Absolute instruction index
pub type Pc = u32;

/// "No destination" marker for result-producing operands
pub const NULL_LOCAL: Local = 255;

/// One arm of a [`Opcode::Match`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCase {
    /// Constant pool index of the case value
    pub constant: u32,
    /// Branch target when the case matches
    pub target: Pc,
}

/// Bytecode instruction with operands.
///
/// Inline-cached forms of field access and calls are not separate
/// instructions; they are states of the interpreter's out-of-line cache
/// arena. [`OpKind`] still names them for trace accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Opcode {
    // Constants
    /// Load constant pool entry `idx`
    ConstOp { idx: u32, dst: Local },
    /// Load a small integer literal
    ConstI8 { val: i8, dst: Local },
    /// Load `true`
    True { dst: Local },
    /// Load `false`
    False { dst: Local },
    /// Load `none`
    None { dst: Local },
    /// Logical not of truthiness
    Not { src: Local, dst: Local },

    // Copies
    /// Borrowed copy, no ownership change
    Copy { src: Local, dst: Local },
    /// Release the previous destination value, then copy
    CopyReleaseDst { src: Local, dst: Local },
    /// Retain the source, then copy
    CopyRetainSrc { src: Local, dst: Local },
    /// Retain the source, copy, then release the previous destination value
    CopyRetainRelease { src: Local, dst: Local },

    // Indexing
    /// `recv[index] = right`
    SetIndex { recv: Local, index: Local, right: Local },
    /// `recv[index] = right`, releasing the value previously stored there
    SetIndexRelease { recv: Local, index: Local, right: Local },
    /// Read a list (or map) element
    IndexList { recv: Local, index: Local, dst: Local },
    /// Read a map entry
    IndexMap { recv: Local, index: Local, dst: Local },
    /// Build a list from `len` consecutive locals
    List { start: Local, len: u8, dst: Local },
    /// Build a map from `num_entries` key/value local pairs
    Map { start: Local, num_entries: u8, dst: Local },
    /// Build an empty map
    MapEmpty { dst: Local },
    /// Copy `recv[start..end]` into a new list; `none` bounds mean the list edge
    SliceList { recv: Local, start: Local, end: Local, dst: Local },

    // Control flow
    /// Jump when `cond` is falsey
    JumpNotCond { cond: Local, target: Pc },
    /// Jump when `cond` is truthy
    JumpCond { cond: Local, target: Pc },
    /// Unconditional jump
    Jump { target: Pc },
    /// Jump when `src` is not `none`
    JumpNotNone { src: Local, target: Pc },

    // Reference counting
    /// Release one local
    Release { local: Local },
    /// Release several locals
    ReleaseN { locals: Vec<Local> },
    /// Retain one local
    Retain { local: Local },

    // Calls
    /// Dynamic method call on the receiver at `start_local + 1`
    CallObjSym { start_local: Local, num_args: u8, num_ret: u8, method: u32 },
    /// Check the argument window against a typed signature
    CallTypeCheck { arg_start: Local, num_args: u8, sig: u32 },
    /// Call a function symbol
    CallSym { start_local: Local, num_args: u8, num_ret: u8, func: u32 },
    /// Call the function value held in `start_local`
    Call { start_local: Local, num_args: u8, num_ret: u8 },
    /// Return local 0
    Ret1,
    /// Return nothing
    Ret0,

    // Fields
    /// Borrowed field read
    Field { recv: Local, field: u32, dst: Local },
    /// Retained field read
    FieldRetain { recv: Local, field: u32, dst: Local },
    /// Field write
    SetField { recv: Local, field: u32, right: Local },
    /// Field write releasing the previous value
    SetFieldRelease { recv: Local, field: u32, right: Local },
    /// Field write checked against the declared field type
    SetCheckFieldRelease { recv: Local, field: u32, right: Local },

    // Function values
    /// Function value without captures
    Lambda { func: u32, dst: Local },
    /// Function value capturing the boxes held in `captured`
    Closure { func: u32, closure_local: Local, captured: Vec<Local>, dst: Local },

    // Comparison
    /// Polymorphic equality
    Compare { left: Local, right: Local, dst: Local },
    /// Polymorphic inequality
    CompareNot { left: Local, right: Local, dst: Local },
    /// `<` on floats
    LessFloat { left: Local, right: Local, dst: Local },
    /// `>` on floats
    GreaterFloat { left: Local, right: Local, dst: Local },
    /// `<=` on floats
    LessEqualFloat { left: Local, right: Local, dst: Local },
    /// `>=` on floats
    GreaterEqualFloat { left: Local, right: Local, dst: Local },
    /// `<` on integers
    LessInt { left: Local, right: Local, dst: Local },
    /// `>` on integers
    GreaterInt { left: Local, right: Local, dst: Local },
    /// `<=` on integers
    LessEqualInt { left: Local, right: Local, dst: Local },
    /// `>=` on integers
    GreaterEqualInt { left: Local, right: Local, dst: Local },

    // Arithmetic
    /// Float add
    AddFloat { left: Local, right: Local, dst: Local },
    /// Float subtract
    SubFloat { left: Local, right: Local, dst: Local },
    /// Float multiply
    MulFloat { left: Local, right: Local, dst: Local },
    /// Float divide
    DivFloat { left: Local, right: Local, dst: Local },
    /// Float power
    PowFloat { left: Local, right: Local, dst: Local },
    /// Float remainder
    ModFloat { left: Local, right: Local, dst: Local },
    /// Float negate
    NegFloat { src: Local, dst: Local },
    /// Integer add (wrapping)
    AddInt { left: Local, right: Local, dst: Local },
    /// Integer subtract (wrapping)
    SubInt { left: Local, right: Local, dst: Local },
    /// Integer multiply (wrapping)
    MulInt { left: Local, right: Local, dst: Local },
    /// Integer divide, throws `error.DivisionByZero`
    DivInt { left: Local, right: Local, dst: Local },
    /// Integer power
    PowInt { left: Local, right: Local, dst: Local },
    /// Integer remainder, throws `error.DivisionByZero`
    ModInt { left: Local, right: Local, dst: Local },
    /// Integer negate
    NegInt { src: Local, dst: Local },

    // Construction
    /// Concatenate `strs[0] expr0 strs[1] ... strs[n]` into a new string
    StringTemplate { start: Local, num_exprs: u8, strs: Vec<u32>, dst: Local },
    /// Set `count` locals starting at `start` to `none`
    Init { start: Local, count: u8 },
    /// Build a user object with up to four fields
    ObjectSmall { type_id: u32, start: Local, num_fields: u8, dst: Local },
    /// Build a user object of any size
    Object { type_id: u32, start: Local, num_fields: u8, dst: Local },

    // Exceptions
    /// Install a try frame
    PushTry { err_dst: Local, catch_pc: Pc },
    /// Remove the innermost try frame and skip the catch block
    PopTry { jump_to: Pc },
    /// Throw the value in `err`
    Throw { err: Local },

    // Fibers
    /// Create a fiber running the body at `body_pc`; the creator continues at `jump_to`
    Coinit {
        start_args: Local,
        num_args: u8,
        body_pc: Pc,
        jump_to: Pc,
        stack_size: u8,
        dst: Local,
    },
    /// Suspend the running fiber, handing `src` to the resumer
    Coyield { src: Local },
    /// Resume the fiber in `fiber`
    Coresume { fiber: Local, dst: Local },
    /// Finish the running fiber with local 0 as its result
    Coreturn,

    // Boxes and captures
    /// Move `src` into a new box
    Box { src: Local, dst: Local },
    /// Store into a box
    SetBoxValue { boxed: Local, right: Local },
    /// Store into a box releasing the previous value
    SetBoxValueRelease { boxed: Local, right: Local },
    /// Borrowed read of a box
    BoxValue { boxed: Local, dst: Local },
    /// Retained read of a box
    BoxValueRetain { boxed: Local, dst: Local },
    /// Retained copy of a captured box from the closure in `closure_local`
    Captured { closure_local: Local, idx: u8, dst: Local },

    // Tags and casts
    /// Enum member value
    Tag { enum_id: u32, member: u32, dst: Local },
    /// Symbol literal
    TagLiteral { sym: u32, dst: Local },
    /// Cast to a concrete runtime type or panic
    Cast { src: Local, type_id: u32, dst: Local },
    /// Cast to a semantic (possibly abstract) type or panic
    CastAbstract { src: Local, sema: u32, dst: Local },

    // Bitwise
    /// Integer and
    BitwiseAnd { left: Local, right: Local, dst: Local },
    /// Integer or
    BitwiseOr { left: Local, right: Local, dst: Local },
    /// Integer xor
    BitwiseXor { left: Local, right: Local, dst: Local },
    /// Integer complement
    BitwiseNot { src: Local, dst: Local },
    /// Integer shift left
    BitwiseLeftShift { left: Local, right: Local, dst: Local },
    /// Integer arithmetic shift right
    BitwiseRightShift { left: Local, right: Local, dst: Local },

    // Iteration
    /// Enter a numeric range loop or jump to `exit` when it is empty
    ForRangeInit {
        start: Local,
        end: Local,
        step: Local,
        counter: Local,
        user_counter: Local,
        reverse: bool,
        exit: Pc,
    },
    /// Advance an ascending range loop, jumping back to `body` while in range
    ForRange { counter: Local, step: Local, end: Local, user_counter: Local, body: Pc },
    /// Advance a descending range loop
    ForRangeReverse { counter: Local, step: Local, end: Local, user_counter: Local, body: Pc },
    /// Multi-way branch on equality with constant cases
    Match { expr: Local, cases: Vec<MatchCase>, else_pc: Pc },

    // Statics
    /// Function value of a function symbol
    StaticFunc { func: u32, dst: Local },
    /// Retained read of a static variable
    StaticVar { var: u32, dst: Local },
    /// Move `src` into a static variable, releasing the previous value
    SetStaticVar { var: u32, src: Local },
    /// Rebind a function symbol to the function value in `src`
    SetStaticFunc { func: u32, src: Local },
    /// Metatype value naming a user type
    Sym { type_id: u32, dst: Local },

    /// End of the top-level program
    End,
}

/// Operation code without operands.
///
/// Includes the inline-cached variants, which exist only as cache states at
/// run time.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpKind {
    ConstOp,
    ConstI8,
    AddFloat,
    SubFloat,
    True,
    False,
    None,
    Not,
    Copy,
    CopyReleaseDst,
    SetIndex,
    SetIndexRelease,
    CopyRetainSrc,
    IndexList,
    IndexMap,
    List,
    Map,
    MapEmpty,
    SliceList,
    JumpNotCond,
    JumpCond,
    Jump,
    Release,
    ReleaseN,
    CallObjSym,
    CallObjNativeFuncIC,
    CallObjFuncIC,
    CallTypeCheck,
    CallSym,
    CallFuncIC,
    CallNativeFuncIC,
    Ret1,
    Ret0,
    Call,
    Field,
    FieldIC,
    FieldRetain,
    FieldRetainIC,
    Lambda,
    Closure,
    Compare,
    LessFloat,
    GreaterFloat,
    LessEqualFloat,
    GreaterEqualFloat,
    LessInt,
    GreaterInt,
    LessEqualInt,
    GreaterEqualInt,
    MulFloat,
    DivFloat,
    PowFloat,
    ModFloat,
    CompareNot,
    StringTemplate,
    NegFloat,
    Init,
    ObjectSmall,
    Object,
    SetField,
    SetFieldRelease,
    SetFieldReleaseIC,
    SetCheckFieldRelease,
    PushTry,
    PopTry,
    Throw,
    Coinit,
    Coyield,
    Coresume,
    Coreturn,
    Retain,
    CopyRetainRelease,
    Box,
    SetBoxValue,
    SetBoxValueRelease,
    BoxValue,
    BoxValueRetain,
    Captured,
    Tag,
    TagLiteral,
    Cast,
    CastAbstract,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    BitwiseLeftShift,
    BitwiseRightShift,
    JumpNotNone,
    AddInt,
    SubInt,
    MulInt,
    DivInt,
    PowInt,
    ModInt,
    NegInt,
    ForRangeInit,
    ForRange,
    ForRangeReverse,
    Match,
    StaticFunc,
    StaticVar,
    SetStaticVar,
    SetStaticFunc,
    Sym,
    End,
}

/// Number of distinct operation codes
pub const NUM_CODES: usize = OpKind::End as usize + 1;

impl OpKind {
    /// Whether this code only exists as an inline cache state
    pub fn is_inline_cached(self) -> bool {
        matches!(
            self,
            OpKind::CallObjNativeFuncIC
                | OpKind::CallObjFuncIC
                | OpKind::CallFuncIC
                | OpKind::CallNativeFuncIC
                | OpKind::FieldIC
                | OpKind::FieldRetainIC
                | OpKind::SetFieldReleaseIC
        )
    }
}

impl Opcode {
    /// Operation code of this instruction
    pub fn kind(&self) -> OpKind {
        use Opcode as O;
        match self {
            O::ConstOp { .. } => OpKind::ConstOp,
            O::ConstI8 { .. } => OpKind::ConstI8,
            O::True { .. } => OpKind::True,
            O::False { .. } => OpKind::False,
            O::None { .. } => OpKind::None,
            O::Not { .. } => OpKind::Not,
            O::Copy { .. } => OpKind::Copy,
            O::CopyReleaseDst { .. } => OpKind::CopyReleaseDst,
            O::CopyRetainSrc { .. } => OpKind::CopyRetainSrc,
            O::CopyRetainRelease { .. } => OpKind::CopyRetainRelease,
            O::SetIndex { .. } => OpKind::SetIndex,
            O::SetIndexRelease { .. } => OpKind::SetIndexRelease,
            O::IndexList { .. } => OpKind::IndexList,
            O::IndexMap { .. } => OpKind::IndexMap,
            O::List { .. } => OpKind::List,
            O::Map { .. } => OpKind::Map,
            O::MapEmpty { .. } => OpKind::MapEmpty,
            O::SliceList { .. } => OpKind::SliceList,
            O::JumpNotCond { .. } => OpKind::JumpNotCond,
            O::JumpCond { .. } => OpKind::JumpCond,
            O::Jump { .. } => OpKind::Jump,
            O::JumpNotNone { .. } => OpKind::JumpNotNone,
            O::Release { .. } => OpKind::Release,
            O::ReleaseN { .. } => OpKind::ReleaseN,
            O::Retain { .. } => OpKind::Retain,
            O::CallObjSym { .. } => OpKind::CallObjSym,
            O::CallTypeCheck { .. } => OpKind::CallTypeCheck,
            O::CallSym { .. } => OpKind::CallSym,
            O::Call { .. } => OpKind::Call,
            O::Ret1 => OpKind::Ret1,
            O::Ret0 => OpKind::Ret0,
            O::Field { .. } => OpKind::Field,
            O::FieldRetain { .. } => OpKind::FieldRetain,
            O::SetField { .. } => OpKind::SetField,
            O::SetFieldRelease { .. } => OpKind::SetFieldRelease,
            O::SetCheckFieldRelease { .. } => OpKind::SetCheckFieldRelease,
            O::Lambda { .. } => OpKind::Lambda,
            O::Closure { .. } => OpKind::Closure,
            O::Compare { .. } => OpKind::Compare,
            O::CompareNot { .. } => OpKind::CompareNot,
            O::LessFloat { .. } => OpKind::LessFloat,
            O::GreaterFloat { .. } => OpKind::GreaterFloat,
            O::LessEqualFloat { .. } => OpKind::LessEqualFloat,
            O::GreaterEqualFloat { .. } => OpKind::GreaterEqualFloat,
            O::LessInt { .. } => OpKind::LessInt,
            O::GreaterInt { .. } => OpKind::GreaterInt,
            O::LessEqualInt { .. } => OpKind::LessEqualInt,
            O::GreaterEqualInt { .. } => OpKind::GreaterEqualInt,
            O::AddFloat { .. } => OpKind::AddFloat,
            O::SubFloat { .. } => OpKind::SubFloat,
            O::MulFloat { .. } => OpKind::MulFloat,
            O::DivFloat { .. } => OpKind::DivFloat,
            O::PowFloat { .. } => OpKind::PowFloat,
            O::ModFloat { .. } => OpKind::ModFloat,
            O::NegFloat { .. } => OpKind::NegFloat,
            O::AddInt { .. } => OpKind::AddInt,
            O::SubInt { .. } => OpKind::SubInt,
            O::MulInt { .. } => OpKind::MulInt,
            O::DivInt { .. } => OpKind::DivInt,
            O::PowInt { .. } => OpKind::PowInt,
            O::ModInt { .. } => OpKind::ModInt,
            O::NegInt { .. } => OpKind::NegInt,
            O::StringTemplate { .. } => OpKind::StringTemplate,
            O::Init { .. } => OpKind::Init,
            O::ObjectSmall { .. } => OpKind::ObjectSmall,
            O::Object { .. } => OpKind::Object,
            O::PushTry { .. } => OpKind::PushTry,
            O::PopTry { .. } => OpKind::PopTry,
            O::Throw { .. } => OpKind::Throw,
            O::Coinit { .. } => OpKind::Coinit,
            O::Coyield { .. } => OpKind::Coyield,
            O::Coresume { .. } => OpKind::Coresume,
            O::Coreturn => OpKind::Coreturn,
            O::Box { .. } => OpKind::Box,
            O::SetBoxValue { .. } => OpKind::SetBoxValue,
            O::SetBoxValueRelease { .. } => OpKind::SetBoxValueRelease,
            O::BoxValue { .. } => OpKind::BoxValue,
            O::BoxValueRetain { .. } => OpKind::BoxValueRetain,
            O::Captured { .. } => OpKind::Captured,
            O::Tag { .. } => OpKind::Tag,
            O::TagLiteral { .. } => OpKind::TagLiteral,
            O::Cast { .. } => OpKind::Cast,
            O::CastAbstract { .. } => OpKind::CastAbstract,
            O::BitwiseAnd { .. } => OpKind::BitwiseAnd,
            O::BitwiseOr { .. } => OpKind::BitwiseOr,
            O::BitwiseXor { .. } => OpKind::BitwiseXor,
            O::BitwiseNot { .. } => OpKind::BitwiseNot,
            O::BitwiseLeftShift { .. } => OpKind::BitwiseLeftShift,
            O::BitwiseRightShift { .. } => OpKind::BitwiseRightShift,
            O::ForRangeInit { .. } => OpKind::ForRangeInit,
            O::ForRange { .. } => OpKind::ForRange,
            O::ForRangeReverse { .. } => OpKind::ForRangeReverse,
            O::Match { .. } => OpKind::Match,
            O::StaticFunc { .. } => OpKind::StaticFunc,
            O::StaticVar { .. } => OpKind::StaticVar,
            O::SetStaticVar { .. } => OpKind::SetStaticVar,
            O::SetStaticFunc { .. } => OpKind::SetStaticFunc,
            O::Sym { .. } => OpKind::Sym,
            O::End => OpKind::End,
        }
    }

    /// Absolute branch targets encoded in this instruction
    pub fn branch_targets(&self) -> Vec<Pc> {
        match self {
            Opcode::JumpNotCond { target, .. }
            | Opcode::JumpCond { target, .. }
            | Opcode::Jump { target }
            | Opcode::JumpNotNone { target, .. } => vec![*target],
            Opcode::PushTry { catch_pc, .. } => vec![*catch_pc],
            Opcode::PopTry { jump_to } => vec![*jump_to],
            Opcode::Coinit { body_pc, jump_to, .. } => vec![*body_pc, *jump_to],
            Opcode::ForRangeInit { exit, .. } => vec![*exit],
            Opcode::ForRange { body, .. } | Opcode::ForRangeReverse { body, .. } => vec![*body],
            Opcode::Match { cases, else_pc, .. } => cases
                .iter()
                .map(|c| c.target)
                .chain(std::iter::once(*else_pc))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Constant pool indices referenced by this instruction
    pub fn constant_refs(&self) -> Vec<u32> {
        match self {
            Opcode::ConstOp { idx, .. } => vec![*idx],
            Opcode::StringTemplate { strs, .. } => strs.clone(),
            Opcode::Match { cases, .. } => cases.iter().map(|c| c.constant).collect(),
            _ => Vec::new(),
        }
    }
}

//! Typed format arguments for panic and diagnostic messages.

use std::fmt::Write;

/// One argument to [`format_template`].
#[derive(Debug, Clone, PartialEq)]
pub enum FmtValue {
    /// Single byte character
    Char(u8),
    /// String slice
    String(String),
    /// Signed 8-bit
    I8(i8),
    /// Unsigned 8-bit
    U8(u8),
    /// Signed 16-bit
    I16(i16),
    /// Unsigned 16-bit
    U16(u16),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 32-bit
    I32(i32),
    /// Signed 48-bit integer, stored widened
    I48(i64),
    /// Unsigned 64-bit
    U64(u64),
    /// Float
    F64(f64),
    /// Boolean
    Bool(bool),
    /// Raw address, printed in hex
    Ptr(usize),
    /// Enum member name
    Enum(String),
    /// Error symbol name, printed as `error.Name`
    Error(String),
}

impl std::fmt::Display for FmtValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FmtValue::Char(c) => write!(f, "{}", *c as char),
            FmtValue::String(s) | FmtValue::Enum(s) => f.write_str(s),
            FmtValue::I8(n) => write!(f, "{n}"),
            FmtValue::U8(n) => write!(f, "{n}"),
            FmtValue::I16(n) => write!(f, "{n}"),
            FmtValue::U16(n) => write!(f, "{n}"),
            FmtValue::U32(n) => write!(f, "{n}"),
            FmtValue::I32(n) => write!(f, "{n}"),
            FmtValue::I48(n) => write!(f, "{n}"),
            FmtValue::U64(n) => write!(f, "{n}"),
            FmtValue::F64(n) => write!(f, "{n}"),
            FmtValue::Bool(b) => write!(f, "{b}"),
            FmtValue::Ptr(p) => write!(f, "{p:#x}"),
            FmtValue::Error(s) => write!(f, "error.{s}"),
        }
    }
}

/// Replace each `{}` in `format` with the next argument.
///
/// Missing arguments leave the placeholder as is; extra arguments are ignored.
///
/// ```
/// use core_types::{format_template, FmtValue};
///
/// let msg = format_template("Expected {} arguments, found {}.", &[FmtValue::U8(2), FmtValue::U8(3)]);
/// assert_eq!(msg, "Expected 2 arguments, found 3.");
/// ```
pub fn format_template(format: &str, args: &[FmtValue]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut rest = format;
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        match args.next() {
            Some(arg) => {
                let _ = write!(out, "{arg}");
            }
            None => out.push_str("{}"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

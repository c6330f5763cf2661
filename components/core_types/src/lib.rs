//! Core value types shared by every VM component.
//!
//! # Overview
//!
//! - [`Value`] - Tagged dynamic value
//! - [`ObjectId`] - Generational handle to a heap object
//! - [`TypeId`] / [`SemaTypeId`] - Runtime and semantic type numbering
//! - [`ResultCode`] / [`Panic`] - How an execution ended
//! - [`SourcePosition`] / [`StackFrame`] / [`CompactFrame`] - Trace support
//! - [`RcCounters`] - Reference-count trace counters
//!
//! # Examples
//!
//! ```
//! use core_types::{Value, TYPE_INTEGER};
//!
//! let n = Value::Integer(42);
//! assert!(n.is_truthy());
//! assert_eq!(n.immediate_type_id(), Some(TYPE_INTEGER));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod counters;
mod error;
mod fmt;
mod source;
pub mod type_id;
mod value;

pub use counters::RcCounters;
pub use error::{Panic, PanicType, ResultCode};
pub use fmt::{format_template, FmtValue};
pub use source::{CompactFrame, SourcePosition, StackFrame};
pub use type_id::*;
pub use value::{ObjectId, StrRef, SymbolId, Value};

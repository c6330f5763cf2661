//! Diagnostic trace counters.

use std::collections::BTreeMap;

use bytecode_system::OpKind;
use core_types::RcCounters;
use serde::Serialize;

/// Snapshot of execution counters, not part of the functional contract
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    /// Executed instructions per operation code; cache hits count under the IC codes
    pub op_counts: BTreeMap<OpKind, u64>,
    /// Total instructions executed
    pub total_ops: u64,
    /// Reference-count counters
    pub rc: RcCounters,
    /// Inline cache hits
    pub ic_hits: u64,
    /// Inline cache misses
    pub ic_misses: u64,
}

impl Trace {
    /// Count for one operation code
    pub fn count(&self, kind: OpKind) -> u64 {
        self.op_counts.get(&kind).copied().unwrap_or_default()
    }

    pub(crate) fn record(&mut self, kind: OpKind) {
        *self.op_counts.entry(kind).or_default() += 1;
        self.total_ops += 1;
    }
}

//! Debug table mapping instruction indices to source positions.

use core_types::SourcePosition;
use serde::{Deserialize, Serialize};

use crate::opcode::Pc;

/// One debug table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSym {
    /// Instruction index
    pub pc: Pc,
    /// Source position of the instruction
    pub pos: SourcePosition,
    /// Enclosing function (index into the chunk function table), `None` at top level
    #[serde(default)]
    pub func: Option<u32>,
}

/// Debug entries ordered by pc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugTable {
    syms: Vec<DebugSym>,
}

impl DebugTable {
    /// Record a position, keeping entries sorted by pc.
    ///
    /// A second entry for the same pc replaces the first.
    pub fn insert(&mut self, sym: DebugSym) {
        match self.syms.binary_search_by_key(&sym.pc, |s| s.pc) {
            Ok(idx) => self.syms[idx] = sym,
            Err(idx) => self.syms.insert(idx, sym),
        }
    }

    /// Entry recorded exactly at `pc`
    pub fn lookup_exact(&self, pc: Pc) -> Option<&DebugSym> {
        self.syms
            .binary_search_by_key(&pc, |s| s.pc)
            .ok()
            .map(|idx| &self.syms[idx])
    }

    /// Closest entry at or before `pc`
    pub fn lookup_nearest(&self, pc: Pc) -> Option<&DebugSym> {
        let idx = self.syms.partition_point(|s| s.pc <= pc);
        idx.checked_sub(1).map(|i| &self.syms[i])
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.syms.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    pub(crate) fn normalize(&mut self) {
        self.syms.sort_by_key(|s| s.pc);
        self.syms.dedup_by_key(|s| s.pc);
    }
}

//! Inline caches for call sites and field accesses.
//!
//! Caches live out of line in an arena indexed by pc. Each site holds a
//! single most-recently-used entry guarded by an exact key (receiver type id
//! or function symbol) and by the symbol table generation at fill time. A
//! generation bump makes every older entry miss, so a cache never answers
//! with a target that a rebinding has replaced.

use core_types::{SemaTypeId, TypeId};

use crate::symbols::FuncTarget;

/// Single-entry cache
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InlineCache<K, T> {
    /// Nothing cached yet
    #[default]
    Uninitialized,
    /// One key cached
    Monomorphic {
        /// Guard key
        key: K,
        /// Cached answer
        target: T,
        /// Symbol table generation at fill time
        generation: u64,
    },
}

impl<K: PartialEq + Copy, T: Copy> InlineCache<K, T> {
    /// Cached answer for `key`, if the entry is current
    pub fn lookup(&self, key: K, generation: u64) -> Option<T> {
        match self {
            InlineCache::Monomorphic {
                key: k,
                target,
                generation: g,
            } if *k == key && *g == generation => Some(*target),
            _ => None,
        }
    }

    /// Replace the entry
    pub fn update(&mut self, key: K, target: T, generation: u64) {
        *self = InlineCache::Monomorphic {
            key,
            target,
            generation,
        };
    }

    /// Whether an entry is present, current or not
    pub fn is_specialized(&self) -> bool {
        matches!(self, InlineCache::Monomorphic { .. })
    }
}

/// Where a field lives in objects of one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    /// Field index
    pub offset: u16,
    /// Declared field type
    pub field_type: SemaTypeId,
}

/// Cache state of one pc
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CacheCell {
    /// Not a cached site, or never executed
    #[default]
    Empty,
    /// Call site keyed by receiver type id or function symbol id
    Call(InlineCache<u32, FuncTarget>),
    /// Field site keyed by receiver type id
    Field(InlineCache<TypeId, FieldSlot>),
}

/// Cache arena of a loaded program
#[derive(Debug, Clone, Default)]
pub struct InlineCaches {
    cells: Vec<CacheCell>,
    hits: u64,
    misses: u64,
}

impl InlineCaches {
    /// Arena with one empty cell per instruction
    pub fn new(num_instructions: usize) -> Self {
        Self {
            cells: vec![CacheCell::Empty; num_instructions],
            hits: 0,
            misses: 0,
        }
    }

    /// Cached call target at `pc`
    pub fn call(&mut self, pc: u32, key: u32, generation: u64) -> Option<FuncTarget> {
        let hit = match self.cells.get(pc as usize) {
            Some(CacheCell::Call(c)) => c.lookup(key, generation),
            _ => None,
        };
        self.tally(hit.is_some());
        hit
    }

    /// Fill the call cache at `pc`
    pub fn set_call(&mut self, pc: u32, key: u32, target: FuncTarget, generation: u64) {
        if let Some(cell) = self.cells.get_mut(pc as usize) {
            let mut cache = InlineCache::default();
            cache.update(key, target, generation);
            *cell = CacheCell::Call(cache);
        }
    }

    /// Cached field slot at `pc`
    pub fn field(&mut self, pc: u32, type_id: TypeId, generation: u64) -> Option<FieldSlot> {
        let hit = match self.cells.get(pc as usize) {
            Some(CacheCell::Field(c)) => c.lookup(type_id, generation),
            _ => None,
        };
        self.tally(hit.is_some());
        hit
    }

    /// Fill the field cache at `pc`
    pub fn set_field(&mut self, pc: u32, type_id: TypeId, slot: FieldSlot, generation: u64) {
        if let Some(cell) = self.cells.get_mut(pc as usize) {
            let mut cache = InlineCache::default();
            cache.update(type_id, slot, generation);
            *cell = CacheCell::Field(cache);
        }
    }

    /// Cache state at `pc`
    pub fn cell(&self, pc: u32) -> Option<&CacheCell> {
        self.cells.get(pc as usize)
    }

    /// Lookups answered from a cache
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that fell back to the full resolver
    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn tally(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

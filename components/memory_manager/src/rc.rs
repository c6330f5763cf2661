//! Retain/release protocol.
//!
//! `rc` counts owning slots. Releasing to zero frees the object and
//! releases its children through a worklist, so long chains never recurse.
//! Cycles are never reclaimed automatically; [`Heap::cycle_report`] only
//! counts what is left once every root is gone.

use std::collections::HashMap;

use core_types::{ObjectId, Value};
use tracing::{error, trace, warn};

use crate::error::HeapError;
use crate::heap::Heap;
use crate::object::child_ids;

/// Leaked objects found after all roots were released
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Objects still alive
    pub leaked: Vec<ObjectId>,
    /// Connected groups among the leaked objects
    pub groups: usize,
}

impl Heap {
    /// Increment the count of a heap value. Immediates are ignored.
    pub fn retain(&mut self, v: Value) -> Result<(), HeapError> {
        self.counters.num_retain_attempts += 1;
        let Value::Heap(id) = v else {
            return Ok(());
        };
        match self.object_mut_or(id, false).map(|obj| obj.rc += 1) {
            Ok(()) => {
                self.counters.num_retains += 1;
                Ok(())
            }
            Err(e) => {
                error!(%id, error = %e, "retain of dead object");
                Err(e)
            }
        }
    }

    /// Decrement the count of a heap value, freeing it on zero.
    pub fn release(&mut self, v: Value) -> Result<(), HeapError> {
        self.counters.num_release_attempts += 1;
        let Value::Heap(id) = v else {
            return Ok(());
        };
        let mut worklist = vec![id];
        let mut first = true;
        while let Some(id) = worklist.pop() {
            if !first {
                self.counters.num_release_attempts += 1;
            }
            first = false;
            let remaining = match self.object_mut_or(id, true) {
                Ok(obj) => {
                    obj.rc -= 1;
                    obj.rc
                }
                Err(e) => {
                    error!(%id, error = %e, "release of dead object");
                    return Err(e);
                }
            };
            self.counters.num_releases += 1;
            if remaining > 0 {
                continue;
            }
            if let Some(dead) = self.free_slot(id) {
                trace!(%id, type_id = dead.type_id, "freed");
                let mut children = Vec::new();
                dead.data.into_children(&mut children);
                worklist.extend(children.into_iter().filter_map(|c| c.as_heap()));
            }
        }
        Ok(())
    }

    /// Release several values, stopping at the first invariant violation
    pub fn release_all(&mut self, values: &[Value]) -> Result<(), HeapError> {
        for v in values {
            self.release(*v)?;
        }
        Ok(())
    }

    /// Count objects still alive and group them by reachability among
    /// themselves. Updates the cycle counters.
    pub fn cycle_report(&mut self) -> CycleReport {
        let leaked = self.live_ids();
        if leaked.is_empty() {
            return CycleReport::default();
        }
        let index: HashMap<ObjectId, usize> =
            leaked.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut parent: Vec<usize> = (0..leaked.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (i, id) in leaked.iter().enumerate() {
            let Ok(obj) = self.get(*id) else { continue };
            for child in child_ids(&obj.data) {
                if let Some(&j) = index.get(&child) {
                    let a = find(&mut parent, i);
                    let b = find(&mut parent, j);
                    if a != b {
                        parent[a] = b;
                    }
                }
            }
        }
        let groups = (0..leaked.len())
            .filter(|&i| find(&mut parent, i) == i)
            .count();

        self.counters.num_retain_cycles = leaked.len() as u64;
        self.counters.num_retain_cycle_roots = groups as u64;
        warn!(objects = leaked.len(), groups, "objects alive after teardown");
        CycleReport { leaked, groups }
    }

    /// Free every live object without releasing children. Returns the count.
    pub fn force_release_all(&mut self) -> usize {
        let ids = self.live_ids();
        let mut n = 0;
        for id in ids {
            if self.free_slot(id).is_some() {
                n += 1;
            }
        }
        self.counters.num_force_releases += n as u64;
        n
    }
}

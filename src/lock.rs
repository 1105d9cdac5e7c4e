//! Per-node exclusive access, keyed by home block.
//!
//! The guard covers every handle open on a node, not just one handle.
//! Entries are never dropped from the table since nodes are never deleted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

#[derive(Debug, Default)]
pub struct NodeLocks {
    table: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

/// Held for the duration of one operation on a node; released on drop.
pub struct NodeGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the node whose home block is `home` is free, then takes it.
    pub fn lock(&self, home: u32) -> NodeGuard {
        let node_lock = Arc::clone(self.table.lock().entry(home).or_default());
        NodeGuard {
            _guard: node_lock.lock_arc(),
        }
    }
}

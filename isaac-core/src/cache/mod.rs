//! Program cache & hasher (§4.5). The cache is per-queue; the hash is a
//! structural fingerprint of a tree that collapses renamed buffers and
//! reordered disjoint allocations to the same key.

mod hasher;

pub use hasher::hash_tree;

use crate::driver::Program;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-queue memoization of compiled programs, keyed by the tree's
/// structural hash. Single-writer discipline: only the dispatcher, running
/// on the queue's owning thread, ever inserts (§5).
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: Mutex<HashMap<String, Arc<dyn Program>>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        ProgramCache { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Program>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: String, program: Arc<dyn Program>) {
        self.entries.lock().unwrap().insert(key, program);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, CommandQueue, SimBackend};

    #[test]
    fn miss_then_hit_after_insert() {
        let cache = ProgramCache::new();
        assert!(cache.get("k").is_none());
        let (_, queue) = SimBackend::new_queue(Backend::OpenClLike);
        let program = queue.compile("__kernel void k(){}").unwrap();
        cache.insert("k".into(), program);
        assert!(cache.get("k").is_some());
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}

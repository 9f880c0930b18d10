//! Layout memoization.
//!
//! Results are keyed by a signature over the tree's node identities, type
//! tags, structure and the constraint tuple. The cache holds a fixed number
//! of entries and evicts the oldest first. Style changes are not part of the
//! key; callers invalidate the affected node (or everything) when they change.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use super::Layout;
use super::node::{Constraints, LayoutTree};

pub type Signature = u64;

pub fn signature(tree: &LayoutTree, constraints: Constraints) -> Signature {
    let mut hasher = DefaultHasher::new();
    tree.len().hash(&mut hasher);
    for (_, node) in tree.iter() {
        node.id.hash(&mut hasher);
        node.type_tag.hash(&mut hasher);
        node.parent().map(|p| p.index()).hash(&mut hasher);
    }
    constraints.hash(&mut hasher);
    hasher.finish()
}

struct Entry {
    layout: Layout,
    ids: HashSet<String>,
}

pub struct LayoutCache {
    capacity: usize,
    entries: HashMap<Signature, Entry>,
    order: VecDeque<Signature>,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, sig: Signature) -> Option<Layout> {
        match self.entries.get(&sig) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.layout.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, sig: Signature, layout: Layout) {
        let ids = layout.boxes.iter().map(|b| b.id.clone()).collect();
        if self.entries.insert(sig, Entry { layout, ids }).is_some() {
            self.order.retain(|s| *s != sig);
        }
        self.order.push_back(sig);

        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.entries.remove(&oldest);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Drop every entry whose node set contains `id`.
    pub fn invalidate_node(&mut self, id: &str) -> usize {
        let stale: Vec<Signature> = self
            .entries
            .iter()
            .filter(|(_, e)| e.ids.contains(id))
            .map(|(s, _)| *s)
            .collect();
        for sig in &stale {
            self.entries.remove(sig);
        }
        self.order.retain(|s| !stale.contains(s));
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

//! In-memory block indices.
//!
//! The by-id map owns every block; the by-height index and all parent/uncle
//! references are ids resolved back through it. No locking here: the store
//! is only ever touched under the sidechain mutex.

use crate::{ChainError, ChainResult};
use sidepool_types::{Hash, PoolBlock};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Block graph indices: by-id owner map, by-height buckets, seen-set.
#[derive(Default)]
pub struct BlockStore {
    by_id: HashMap<Hash, PoolBlock>,
    by_height: BTreeMap<u64, Vec<Hash>>,
    seen: HashSet<Hash>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Insert a block, indexing it by id and height.
    pub fn insert(&mut self, block: PoolBlock) -> ChainResult<()> {
        let id = block.sidechain_id;
        let height = block.sidechain_height;
        if self.by_id.contains_key(&id) {
            return Err(ChainError::AlreadyPresent { id });
        }
        self.by_id.insert(id, block);
        self.by_height.entry(height).or_default().push(id);
        Ok(())
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &Hash) -> Option<&PoolBlock> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &Hash) -> Option<&mut PoolBlock> {
        self.by_id.get_mut(id)
    }

    /// Resolve a block's parent, if present.
    pub fn parent_of(&self, block: &PoolBlock) -> Option<&PoolBlock> {
        self.by_id.get(&block.parent)
    }

    /// Ids of all blocks at `height`.
    pub fn at_height(&self, height: u64) -> &[Hash] {
        self.by_height.get(&height).map_or(&[], Vec::as_slice)
    }

    /// Heights at or below `cutoff` that have blocks, ascending.
    pub fn heights_up_to(&self, cutoff: u64) -> Vec<u64> {
        self.by_height.range(..=cutoff).map(|(&h, _)| h).collect()
    }

    /// Remove a block from both indices, returning it.
    pub fn remove(&mut self, id: &Hash) -> Option<PoolBlock> {
        let block = self.by_id.remove(id)?;
        if let Some(bucket) = self.by_height.get_mut(&block.sidechain_height) {
            bucket.retain(|entry| entry != id);
            if bucket.is_empty() {
                self.by_height.remove(&block.sidechain_height);
            }
        }
        Some(block)
    }

    /// Record `id` as seen; true if it was not seen before.
    pub fn mark_seen(&mut self, id: Hash) -> bool {
        self.seen.insert(id)
    }

    /// All blocks, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PoolBlock> {
        self.by_id.values()
    }
}

//! Write-back and cache eviction.

use tracing::debug;

use super::{select_victims, CacheStats, Tree};
use crate::common::format::SUPERBLOCK_BLOCK;
use crate::common::{BlockNr, NodeId, Result};
use crate::storage::Superblock;

impl Tree {
    /// Write every dirty node and the superblock, then flush the device.
    ///
    /// Each written node gets a new flush stamp and, in the checksummed
    /// layout, a fresh checksum. Does nothing on a read-only tree.
    pub fn sync(&mut self) -> Result<()> {
        if self.config.read_only {
            return Ok(());
        }
        self.flush_id += 1;

        let dirty: Vec<NodeId> = self
            .cache
            .iter()
            .filter(|(_, z)| z.dirty && !z.heard_banshee)
            .map(|(id, _)| id)
            .collect();
        for id in &dirty {
            let znode = self.cache.get_mut(*id)?;
            znode.node.seal(self.flush_id);
            self.device.write_block(znode.node.block(), znode.node.as_bytes())?;
            znode.dirty = false;
            CacheStats::bump(&self.stats.nodes_written);
        }

        self.write_superblock()?;
        self.device.flush()?;
        debug!(flush_id = self.flush_id, nodes = dirty.len(), "synced");
        Ok(())
    }

    pub(crate) fn write_superblock(&mut self) -> Result<()> {
        let root_block = match self.root {
            Some(root) => self.node(root)?.block(),
            None => BlockNr::INVALID,
        };
        let sb = Superblock {
            block_size: self.config.node_size as u32,
            root_block,
            height: self.height,
            mkfs_id: self.config.mkfs_id,
            flush_id: self.flush_id,
            block_count: self.config.block_count,
        };
        let mut buf = vec![0u8; self.config.node_size];
        sb.write_to(&mut buf);
        self.device.write_block(BlockNr::new(SUPERBLOCK_BLOCK), &buf)
    }

    /// Shrink the cache back to its capacity.
    ///
    /// Runs between top-level operations only. Dirty nodes are written back
    /// first so that they become evictable. `keep` stays loaded.
    pub(crate) fn maybe_evict(&mut self, keep: Option<NodeId>) -> Result<()> {
        if self.evicting || self.cache.len() <= self.config.cache_capacity {
            return Ok(());
        }
        self.evicting = true;
        let result = self.evict(keep);
        self.evicting = false;
        result
    }

    fn evict(&mut self, keep: Option<NodeId>) -> Result<()> {
        if let Some(id) = keep {
            self.pin(id)?;
        }
        let result = self.evict_unpinned();
        if let Some(id) = keep {
            self.unpin(id)?;
        }
        result
    }

    fn evict_unpinned(&mut self) -> Result<()> {
        self.sync()?;
        let mut evicted = 0;
        loop {
            let over = self.cache.len().saturating_sub(self.config.cache_capacity);
            if over == 0 {
                break;
            }
            let victims = select_victims(&self.cache, self.root, over);
            if victims.is_empty() {
                break;
            }
            for id in victims {
                self.cache.remove(id)?;
                CacheStats::bump(&self.stats.evictions);
                evicted += 1;
            }
        }
        self.cache.forget_siblings();
        debug!(evicted, cached = self.cache.len(), "evicted nodes");
        Ok(())
    }
}
